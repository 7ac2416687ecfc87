//! Development-mode resolution against the process environment.

use quill_render::{
    MemorySource, MiniJinjaEngine, Renderer, RendererOptions, TemplateEngine, Verbosity,
    ENVIRONMENT_VAR,
};
use serial_test::serial;

fn build(options: RendererOptions) -> Renderer<MiniJinjaEngine> {
    Renderer::with_options(MemorySource::new(), MiniJinjaEngine::new(), options)
}

#[test]
#[serial]
fn explicit_dev_wins_over_production_environment() {
    std::env::set_var(ENVIRONMENT_VAR, "production");
    let renderer = build(RendererOptions::new().dev(true));
    std::env::remove_var(ENVIRONMENT_VAR);

    assert!(renderer.is_dev());
    assert_eq!(renderer.engine().verbosity(), Verbosity::Info);
}

#[test]
#[serial]
fn explicit_non_dev_never_raises_verbosity() {
    std::env::set_var(ENVIRONMENT_VAR, "development");
    let renderer = build(RendererOptions::new().dev(false));
    std::env::remove_var(ENVIRONMENT_VAR);

    assert!(!renderer.is_dev());
    assert_eq!(renderer.engine().verbosity(), Verbosity::None);
}

#[test]
#[serial]
fn development_environment_enables_dev_mode() {
    std::env::set_var(ENVIRONMENT_VAR, "development");
    let renderer = build(RendererOptions::new());
    std::env::remove_var(ENVIRONMENT_VAR);

    assert!(renderer.is_dev());
    assert_eq!(renderer.engine().verbosity(), Verbosity::Info);
}

#[test]
#[serial]
fn production_environment_disables_dev_mode() {
    std::env::set_var(ENVIRONMENT_VAR, "production");
    let renderer = build(RendererOptions::new());
    std::env::remove_var(ENVIRONMENT_VAR);

    assert!(!renderer.is_dev());
    assert_eq!(renderer.engine().verbosity(), Verbosity::None);
}

#[test]
#[serial]
fn unset_environment_means_development() {
    std::env::remove_var(ENVIRONMENT_VAR);
    assert!(build(RendererOptions::new()).is_dev());
}
