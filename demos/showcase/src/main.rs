use mannequin_ngin::{SceneConfig, postprocessing::Effect};

/// `showcase [studio|glass] [--chromatic]`
fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let mut config = match args.next().as_deref() {
        Some("studio") => SceneConfig::studio(),
        Some("glass") | None => SceneConfig::glass(),
        Some(other) => anyhow::bail!("unknown scene {other:?}, expected studio or glass"),
    };
    if args.any(|arg| arg == "--chromatic") {
        config = config.with_effect(Effect::ChromaticAberration {
            offset: [0.001, 0.0005],
        });
    }
    mannequin_ngin::run(config)
}
