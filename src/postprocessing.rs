//! Postprocessing configuration.
//!
//! The [`EffectComposer`] is the CPU side of the effect chain: an ordered list of
//! full-screen effects applied after the scene pass, plus the multisampling and
//! clearing settings of that pass. The GPU side lives in [`crate::pipelines::post`].

use crate::data_structures::scene_graph::Scene;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Effect {
    /// Bloom restricted to the selected objects.
    SelectiveBloom {
        intensity: f32,
        luminance_threshold: f32,
        luminance_smoothing: f32,
    },
    /// Edge outline around the selected objects.
    Outline {
        edge_strength: f32,
        visible_edge_color: [f32; 3],
        blur: bool,
    },
    ChromaticAberration {
        offset: [f32; 2],
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassKind {
    SelectiveBloom,
    Outline,
    ChromaticAberration,
}

impl Effect {
    pub fn kind(&self) -> PassKind {
        match self {
            Effect::SelectiveBloom { .. } => PassKind::SelectiveBloom,
            Effect::Outline { .. } => PassKind::Outline,
            Effect::ChromaticAberration { .. } => PassKind::ChromaticAberration,
        }
    }

    /// Whether the effect only applies to selected objects.
    pub fn is_selective(&self) -> bool {
        matches!(
            self,
            Effect::SelectiveBloom { .. } | Effect::Outline { .. }
        )
    }
}

/// Names of the nodes the selective effects apply to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    names: Vec<String>,
}

impl Selection {
    pub fn from_scene(scene: &Scene) -> Self {
        Self {
            names: scene.selected_names(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// One entry of a frame's pass plan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlannedPass {
    pub effect: Effect,
    /// False when the pass has nothing to work on this frame and is skipped on the GPU.
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EffectComposer {
    effects: Vec<Effect>,
    /// Requested sample count of the scene pass.
    pub multisampling: u32,
    /// Clear the color targets before the scene pass.
    pub auto_clear: bool,
}

impl Default for EffectComposer {
    fn default() -> Self {
        Self {
            effects: Vec::new(),
            multisampling: 1,
            auto_clear: true,
        }
    }
}

impl EffectComposer {
    pub fn new(multisampling: u32, auto_clear: bool) -> Self {
        Self {
            effects: Vec::new(),
            multisampling,
            auto_clear,
        }
    }

    pub fn with(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// The configured order, independent of what is in the scene.
    pub fn pass_order(&self) -> Vec<PassKind> {
        self.effects.iter().map(Effect::kind).collect()
    }

    /// Configured passes for this frame. Selective passes are inactive on an empty selection.
    pub fn plan(&self, selection: &Selection) -> Vec<PlannedPass> {
        self.effects
            .iter()
            .map(|effect| PlannedPass {
                effect: *effect,
                active: !(effect.is_selective() && selection.is_empty()),
            })
            .collect()
    }

    /**
     * Sample count the scene pass actually uses. WebGL and most adapters only
     * guarantee 1 and 4, so any request of 4 or more gets 4.
     */
    pub fn sample_count(&self) -> u32 {
        if self.multisampling >= 4 {
            if self.multisampling > 4 {
                log::info!(
                    "multisampling {} is not portable, using 4",
                    self.multisampling
                );
            }
            4
        } else {
            1
        }
    }
}
