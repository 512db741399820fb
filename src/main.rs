use std::panic;
use std::process;

fn main() -> anyhow::Result<()> {
  let orig_hook = panic::take_hook();
  // A panicking worker thread must take the whole run down with it.
  panic::set_hook(Box::new(move |panic_info| {
    orig_hook(panic_info);
    process::exit(1);
  }));
  ffdist_cli::run()
}
