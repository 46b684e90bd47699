use std::f32::consts::TAU;
use std::sync::OnceLock;

use crate::error::Error;
use crate::synth::operator::Operator;

/// Operators per voice. Index 0 is the main carrier "C", 1 is modulator "A",
/// 2 and 3 are the paired "B1"/"B2" modulators sharing one ratio parameter.
pub const OPERATOR_COUNT: usize = 4;
pub const ALGORITHM_COUNT: usize = 8;

/// Phase-modulation depth in radians applied to a modulator's full-scale
/// output. Feedback paths use the same scale.
const MODULATION_DEPTH: f32 = TAU;

/// Output bus a carrier feeds. The voice's `mix` parameter crossfades X→Y.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bus {
    X,
    Y,
}

/// One of the 8 fixed operator routing graphs.
///
/// `edges` are current-sample modulation paths (source modulates
/// destination); the subgraph they form is acyclic and rendered in the
/// precomputed topological `order`. `feedback_edges` carry the source
/// operator's previous-sample output instead, which keeps every graph
/// computable in a single pass.
#[derive(Debug, Clone)]
pub struct AlgorithmDefinition {
    id: u8,
    edges: Vec<(usize, usize)>,
    feedback_edges: Vec<(usize, usize)>,
    carriers: Vec<(usize, Bus)>,
    order: [usize; OPERATOR_COUNT],
}

impl AlgorithmDefinition {
    pub fn new(
        id: u8,
        edges: Vec<(usize, usize)>,
        feedback_edges: Vec<(usize, usize)>,
        carriers: Vec<(usize, Bus)>,
    ) -> Result<Self, Error> {
        for &(source, destination) in edges.iter().chain(feedback_edges.iter()) {
            let index = source.max(destination);
            if index >= OPERATOR_COUNT {
                return Err(Error::InvalidOperatorIndex(index));
            }
        }
        for &(carrier, _) in &carriers {
            if carrier >= OPERATOR_COUNT {
                return Err(Error::InvalidOperatorIndex(carrier));
            }
        }
        let order = Self::topological_order(id, &edges)?;
        Ok(Self {
            id,
            edges,
            feedback_edges,
            carriers,
            order,
        })
    }

    /// Look up one of the fixed algorithms by its 1-based id.
    pub fn get(id: u8) -> Result<&'static AlgorithmDefinition, Error> {
        static TABLE: OnceLock<Vec<AlgorithmDefinition>> = OnceLock::new();
        let table = TABLE.get_or_init(|| {
            build_algorithm_table().expect("built-in algorithm table is valid")
        });
        table
            .get((id as usize).wrapping_sub(1))
            .ok_or(Error::InvalidAlgorithm(id))
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn feedback_edges(&self) -> &[(usize, usize)] {
        &self.feedback_edges
    }

    pub fn carriers(&self) -> &[(usize, Bus)] {
        &self.carriers
    }

    /// Render order of the non-feedback subgraph (modulators before the
    /// operators they modulate).
    pub fn order(&self) -> &[usize; OPERATOR_COUNT] {
        &self.order
    }

    /// Kahn's algorithm over the non-feedback edges. A leftover node with
    /// unsatisfied inputs means the graph is cyclic.
    fn topological_order(
        id: u8,
        edges: &[(usize, usize)],
    ) -> Result<[usize; OPERATOR_COUNT], Error> {
        let mut indegree = [0usize; OPERATOR_COUNT];
        for &(_, destination) in edges {
            indegree[destination] += 1;
        }

        let mut order = [0usize; OPERATOR_COUNT];
        let mut placed = 0;
        let mut ready: Vec<usize> = (0..OPERATOR_COUNT).filter(|&n| indegree[n] == 0).collect();
        while let Some(node) = ready.pop() {
            order[placed] = node;
            placed += 1;
            for &(source, destination) in edges {
                if source == node {
                    indegree[destination] -= 1;
                    if indegree[destination] == 0 {
                        ready.push(destination);
                    }
                }
            }
        }

        if placed == OPERATOR_COUNT {
            Ok(order)
        } else {
            Err(Error::CyclicAlgorithm(id))
        }
    }

    /// Render one voice sample.
    ///
    /// `frequencies` holds the per-operator base frequency (key tracking may
    /// give modulators a different base than the carrier), `envelope_levels`
    /// the per-operator envelope output for this sample, and `previous`
    /// each operator's last-sample output for the feedback paths. `mix`
    /// crossfades the X and Y carrier buses.
    #[allow(clippy::too_many_arguments)]
    pub fn render_sample(
        &self,
        operators: &mut [Operator; OPERATOR_COUNT],
        frequencies: &[f32; OPERATOR_COUNT],
        envelope_levels: &[f32; OPERATOR_COUNT],
        previous: &mut [f32; OPERATOR_COUNT],
        sample_rate: f32,
        mix: f32,
    ) -> f32 {
        let mut modulation = [0.0f32; OPERATOR_COUNT];
        for &(source, destination) in &self.feedback_edges {
            let amount = operators[source].feedback_amount.clamp(0.0, 1.0);
            modulation[destination] += previous[source] * amount * MODULATION_DEPTH;
        }

        let mut outputs = [0.0f32; OPERATOR_COUNT];
        for &op in &self.order {
            let sample = operators[op].render(frequencies[op], modulation[op], sample_rate)
                * envelope_levels[op];
            outputs[op] = sample;
            for &(source, destination) in &self.edges {
                if source == op {
                    modulation[destination] += sample * MODULATION_DEPTH;
                }
            }
        }
        *previous = outputs;

        let mut bus_x = 0.0;
        let mut bus_y = 0.0;
        for &(carrier, bus) in &self.carriers {
            match bus {
                Bus::X => bus_x += outputs[carrier],
                Bus::Y => bus_y += outputs[carrier],
            }
        }
        let mix = mix.clamp(0.0, 1.0);
        bus_x * (1.0 - mix) + bus_y * mix
    }
}

/// The 8 fixed routings. Operator roles: 0 = C, 1 = A, 2 = B1, 3 = B2.
fn build_algorithm_table() -> Result<Vec<AlgorithmDefinition>, Error> {
    use Bus::{X, Y};
    Ok(vec![
        // 1: full stack B2 -> B1 -> A -> C, Y taps A directly.
        AlgorithmDefinition::new(
            1,
            vec![(3, 2), (2, 1), (1, 0)],
            vec![(3, 3)],
            vec![(0, X), (1, Y)],
        )?,
        // 2: B2 and B1 both modulate A.
        AlgorithmDefinition::new(
            2,
            vec![(3, 1), (2, 1), (1, 0)],
            vec![(3, 3)],
            vec![(0, X), (1, Y)],
        )?,
        // 3: B stack and A modulate C in parallel.
        AlgorithmDefinition::new(
            3,
            vec![(3, 2), (2, 0), (1, 0)],
            vec![(3, 3)],
            vec![(0, X), (1, Y)],
        )?,
        // 4: fan-in, every modulator straight into C.
        AlgorithmDefinition::new(
            4,
            vec![(3, 0), (2, 0), (1, 0)],
            vec![(3, 3)],
            vec![(0, X), (0, Y)],
        )?,
        // 5: two independent 2-op stacks.
        AlgorithmDefinition::new(
            5,
            vec![(3, 2), (1, 0)],
            vec![(3, 3)],
            vec![(0, X), (2, Y)],
        )?,
        // 6: B2 modulates both B1 and A.
        AlgorithmDefinition::new(
            6,
            vec![(3, 2), (3, 1)],
            vec![(3, 3)],
            vec![(0, X), (1, X), (2, Y)],
        )?,
        // 7: single stack on X, additive B pair on Y.
        AlgorithmDefinition::new(
            7,
            vec![(1, 0)],
            vec![(3, 3)],
            vec![(0, X), (2, Y), (3, Y)],
        )?,
        // 8: fully additive, feedback on the carrier itself.
        AlgorithmDefinition::new(
            8,
            vec![],
            vec![(0, 0)],
            vec![(0, X), (1, X), (2, Y), (3, Y)],
        )?,
    ])
}
