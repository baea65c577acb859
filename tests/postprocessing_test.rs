use mannequin_ngin::{
    SceneConfig, Showcase,
    postprocessing::{Effect, EffectComposer, PassKind, Selection},
};

use crate::common::test_utils::square_node;

mod common;

const CHROMATIC: Effect = Effect::ChromaticAberration {
    offset: [0.001, 0.0005],
};

#[test]
fn glass_runs_bloom_before_outline() {
    let config = SceneConfig::glass().with_effect(CHROMATIC);
    assert_eq!(
        config.effects.pass_order(),
        vec![
            PassKind::SelectiveBloom,
            PassKind::Outline,
            PassKind::ChromaticAberration
        ]
    );
}

#[test]
fn selective_passes_idle_on_an_empty_selection() {
    let showcase = Showcase::new(SceneConfig::glass().with_effect(CHROMATIC), 800, 600);
    let selection = showcase.selection();
    assert!(selection.is_empty());

    let plan = showcase.composer().plan(&selection);
    let active: Vec<_> = plan.iter().map(|pass| (pass.effect.kind(), pass.active)).collect();
    assert_eq!(
        active,
        vec![
            (PassKind::SelectiveBloom, false),
            (PassKind::Outline, false),
            (PassKind::ChromaticAberration, true),
        ]
    );
}

#[test]
fn selected_nodes_activate_the_selective_passes() {
    let mut showcase = Showcase::new(SceneConfig::glass(), 800, 600);
    let mut body = square_node("body", 0.1, 0.0);
    body.selected = true;
    showcase.on_model_loaded(body);

    let selection = showcase.selection();
    assert!(selection.contains("body"));
    assert!(!selection.contains(Showcase::MARKER));
    assert!(showcase.composer().plan(&selection).iter().all(|pass| pass.active));
}

#[test]
fn multisampling_is_clamped_to_portable_counts() {
    assert_eq!(SceneConfig::glass().effects.sample_count(), 4);
    assert_eq!(EffectComposer::default().sample_count(), 1);
    assert_eq!(EffectComposer::new(2, true).sample_count(), 1);
    assert_eq!(EffectComposer::new(4, true).sample_count(), 4);
}

#[test]
fn empty_chain_plans_nothing() {
    let composer = SceneConfig::studio().effects;
    assert!(composer.plan(&Selection::default()).is_empty());
    assert!(composer.auto_clear);
}
