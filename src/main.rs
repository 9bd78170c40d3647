use hello_triangle::{App, AppConfig, config::CONFIG_PATH, logging::init_logging};
use winit::event_loop::EventLoop;

fn main() -> hello_triangle::Result<()> {
  init_logging();

  let config = AppConfig::load(CONFIG_PATH)?;
  let event_loop = EventLoop::new()?;
  let mut app = App::new(&event_loop, config)?;
  event_loop.run_app(&mut app)?;

  match app.take_error() {
    Some(e) => Err(e),
    None => Ok(()),
  }
}
