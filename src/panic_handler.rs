use std::panic;

/// Install the panic hook: readable backtraces in debug builds, a crash
/// report pointer in release builds. Both log the panic first.
pub fn initialize_panic_handler() {
    if cfg!(debug_assertions) {
        better_panic::install();
    } else {
        human_panic::setup_panic!();
    }

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        log::error!("{panic_info}");
        default_hook(panic_info);
        std::process::exit(1);
    }));
}
