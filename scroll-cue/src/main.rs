#[cfg(not(target_arch = "wasm32"))]
mod cli;

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    cli::run();
}

// The browser build is the cdylib; the binary has nothing to do there.
#[cfg(target_arch = "wasm32")]
fn main() {}
