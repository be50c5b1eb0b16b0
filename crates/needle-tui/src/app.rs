//! App: terminal setup, the event loop and the top-level layout.
//!
//! Architecture:
//! - The simulation task owns both sprung masses and publishes deflections
//!   to the `MeterBus`; after every tick it asks for a redraw.
//! - Keyboard events come in from a blocking reader task that polls, so it
//!   notices shutdown without waiting for another key press.
//! - Both arrive as `AppMessage`s on one `tokio::mpsc` channel; the loop
//!   draws, then awaits the next message.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Layout, Rect},
    widgets::Block,
    Frame, Terminal,
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use needle_core::{spawn_simulation, Channel, ForcePublisher, MeterBus, SimulationDriver};

use crate::capture::Capture;
use crate::components::meter_face::{MeterFace, HEIGHT_RATIO};
use crate::components::status_bar;
use crate::theme::{style_default, Theme};

/// Columns between the two meters.
const METER_GAP: u16 = 2;

/// Longest the key reader blocks before rechecking its stop flag.
const INPUT_POLL: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub enum AppMessage {
    Event(Event),
    /// The simulation advanced; deflections on the bus are new.
    Redraw,
}

/// Where forces come from. Held for the life of the app: dropping a
/// `Capture` stops the stream.
pub enum Source {
    Capture(Capture),
    Demo(JoinHandle<()>),
}

impl Source {
    pub fn label(&self) -> String {
        match self {
            Source::Capture(capture) => capture.description().to_string(),
            Source::Demo(_) => "demo signal".to_string(),
        }
    }

    fn stop(&self) {
        if let Source::Demo(handle) = self {
            handle.abort();
        }
    }
}

/// Pin both needles to full scale for `duration`, then hand the bus over to
/// `publisher`. Blocks published before that are dropped.
pub fn start_sweep(
    bus: Arc<MeterBus>,
    publisher: ForcePublisher,
    duration: Duration,
) -> JoinHandle<()> {
    publisher.set_enabled(false);
    bus.set_forces(1.0);
    info!("startup sweep for {:?}", duration);

    tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        bus.set_forces(0.0);
        publisher.set_enabled(true);
        debug!("startup sweep done, input connected");
    })
}

pub struct App {
    bus: Arc<MeterBus>,
    faces: [MeterFace; 2],
    theme: Theme,
    source: Source,
    source_label: String,
    should_quit: bool,
}

impl App {
    pub fn new(bus: Arc<MeterBus>, theme: Theme, source: Source) -> Self {
        let source_label = source.label();
        Self {
            bus,
            faces: Channel::ALL.map(MeterFace::new),
            theme,
            source,
            source_label,
            should_quit: false,
        }
    }

    pub async fn run(mut self, driver: SimulationDriver, tick: Duration) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(64);

        // ── Background task: keyboard events ──────────────────────────────────
        let stop_input = Arc::new(AtomicBool::new(false));
        let input = {
            let event_tx = tx.clone();
            let stop = stop_input.clone();
            tokio::task::spawn_blocking(move || pump_events(&event_tx, &stop, read_terminal_event))
        };

        // ── Simulation: one redraw request per tick, dropped if one is queued ──
        let redraw_tx = tx;
        let simulation = spawn_simulation(driver, tick, move || {
            match redraw_tx.try_send(AppMessage::Redraw) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Closed(_)) => false,
            }
        });

        let result = self.event_loop(&mut terminal, &mut rx).await;

        // ── Teardown ──────────────────────────────────────────────────────────
        simulation.abort();
        self.source.stop();
        // Join the reader so runtime shutdown has no blocking task to wait on.
        stop_input.store(true, Ordering::Relaxed);
        drop(rx);
        if let Err(e) = input.await {
            warn!("key reader ended abnormally: {e}");
        }
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        info!("needle stopped");

        result
    }

    async fn event_loop<B: Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        rx: &mut mpsc::Receiver<AppMessage>,
    ) -> anyhow::Result<()>
    where
        B::Error: Send + Sync + 'static,
    {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }

            if self.should_quit {
                break;
            }

            let Some(msg) = rx.recv().await else {
                break;
            };
            needs_redraw = self.handle_message(msg);
            // Coalesce whatever else is already queued into one frame.
            while let Ok(next) = rx.try_recv() {
                needs_redraw |= self.handle_message(next);
            }
        }
        Ok(())
    }

    /// Returns whether the screen needs redrawing.
    fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Redraw => true,
            AppMessage::Event(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                self.handle_key(key);
                self.should_quit
            }
            AppMessage::Event(Event::Resize(..)) => true,
            AppMessage::Event(_) => false,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') if key.modifiers == KeyModifiers::NONE => {
                info!("quit requested");
                self.should_quit = true;
            }
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers == KeyModifiers::CONTROL => {
                self.should_quit = true;
            }
            _ => {}
        }
    }

    fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        frame.render_widget(Block::default().style(style_default()), area);

        let [title, meters, footer] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .areas(area);

        status_bar::draw_title(frame, title);

        let [left, _, right] = Layout::horizontal([
            Constraint::Fill(1),
            Constraint::Length(METER_GAP),
            Constraint::Fill(1),
        ])
        .areas(meters);
        for (face, slot) in self.faces.iter().zip([left, right]) {
            let channel = face.channel();
            face.draw(frame, fit_face(slot), self.bus.deflection(channel), &self.theme);
        }

        status_bar::draw_footer(frame, footer, &self.source_label);
    }
}

/// Forward events from `next` to `tx` until `stop` is set, the receiver
/// goes away, or reading fails. `next` waits at most the given timeout and
/// yields `None` if nothing arrived.
fn pump_events<F>(tx: &mpsc::Sender<AppMessage>, stop: &AtomicBool, mut next: F)
where
    F: FnMut(Duration) -> io::Result<Option<Event>>,
{
    while !stop.load(Ordering::Relaxed) {
        match next(INPUT_POLL) {
            Ok(Some(ev)) => {
                if tx.blocking_send(AppMessage::Event(ev)).is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("terminal input error: {e}");
                break;
            }
        }
    }
}

fn read_terminal_event(timeout: Duration) -> io::Result<Option<Event>> {
    if event::poll(timeout)? {
        event::read().map(Some)
    } else {
        Ok(None)
    }
}

/// Largest face that fits in `slot`, centred.
///
/// Braille dots are roughly square and a cell is 2×4 dots, so a face of
/// `w` columns wants `w · HEIGHT_RATIO / 2` rows.
pub fn fit_face(slot: Rect) -> Rect {
    let rows_per_col = HEIGHT_RATIO / 2.0;
    let width = slot
        .width
        .min((slot.height as f64 / rows_per_col).floor() as u16);
    let height = ((width as f64 * rows_per_col).round() as u16).min(slot.height);
    Rect::new(
        slot.x + (slot.width - width) / 2,
        slot.y + (slot.height - height) / 2,
        width,
        height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use needle_core::config::DisplayConfig;
    use needle_core::ForceCurve;
    use ratatui::backend::TestBackend;

    fn demo_app() -> App {
        let bus = MeterBus::new(0.5);
        let theme = Theme::from_display(&DisplayConfig::default());
        App::new(bus, theme, Source::Demo(tokio::spawn(async {})))
    }

    #[tokio::test]
    async fn test_quit_keys() {
        for key in [
            KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE),
            KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE),
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        ] {
            let mut app = demo_app();
            app.handle_key(key);
            assert!(app.should_quit, "{key:?}");
        }

        let mut app = demo_app();
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE));
        app.handle_key(KeyEvent::new(KeyCode::Char('Q'), KeyModifiers::SHIFT));
        assert!(!app.should_quit);
    }

    #[tokio::test]
    async fn test_redraw_and_resize_request_a_frame() {
        let mut app = demo_app();
        assert!(app.handle_message(AppMessage::Redraw));
        assert!(app.handle_message(AppMessage::Event(Event::Resize(80, 24))));
        assert!(!app.handle_message(AppMessage::Event(Event::FocusGained)));
    }

    #[tokio::test]
    async fn test_event_loop_exits_on_quit() {
        let mut app = demo_app();
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(AppMessage::Redraw).await.unwrap();
        tx.send(AppMessage::Event(Event::Key(KeyEvent::new(
            KeyCode::Char('q'),
            KeyModifiers::NONE,
        ))))
        .await
        .unwrap();

        app.event_loop(&mut terminal, &mut rx).await.unwrap();
        assert!(app.should_quit);

        let buf = terminal.backend().buffer();
        let first_row: String = (0..20u16).map(|x| buf[(x, 0)].symbol()).collect();
        assert!(first_row.contains("needle"));
        let last_row: String = (0..80u16).map(|x| buf[(x, 23)].symbol()).collect();
        assert!(last_row.contains("demo signal"));
    }

    fn key(c: char) -> Event {
        Event::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
    }

    #[test]
    fn test_pump_returns_at_once_when_stopped() {
        let (tx, _rx) = mpsc::channel(4);
        let stop = AtomicBool::new(true);
        pump_events(&tx, &stop, |_| -> io::Result<Option<Event>> {
            panic!("read after stop")
        });
    }

    #[test]
    fn test_pump_notices_stop_while_idle() {
        let (tx, mut rx) = mpsc::channel(4);
        let stop = AtomicBool::new(false);
        let mut calls = 0;
        pump_events(&tx, &stop, |timeout| {
            assert_eq!(timeout, INPUT_POLL);
            calls += 1;
            match calls {
                1 => Ok(Some(key('q'))),
                // quiet terminal; shutdown arrives meanwhile
                _ => {
                    stop.store(true, Ordering::Relaxed);
                    Ok(None)
                }
            }
        });

        assert_eq!(calls, 2);
        assert!(matches!(rx.try_recv(), Ok(AppMessage::Event(Event::Key(_)))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_pump_stops_without_receiver_or_on_error() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let stop = AtomicBool::new(false);
        let mut calls = 0;
        pump_events(&tx, &stop, |_| {
            calls += 1;
            Ok(Some(key('x')))
        });
        assert_eq!(calls, 1);

        let (tx, _rx) = mpsc::channel(4);
        pump_events(&tx, &stop, |_| Err(io::Error::other("tty gone")));
    }

    #[test]
    fn test_fit_face_keeps_aspect() {
        let wide = fit_face(Rect::new(0, 1, 100, 10));
        assert_eq!((wide.width, wide.height), (40, 10));
        assert_eq!(wide.x, 30);

        let tall = fit_face(Rect::new(0, 0, 40, 30));
        assert_eq!((tall.width, tall.height), (40, 10));
        assert_eq!(tall.y, 10);

        assert_eq!(fit_face(Rect::new(5, 5, 0, 0)).area(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_sweep_holds_then_releases() {
        let bus = MeterBus::new(0.0);
        let publisher = ForcePublisher::new(bus.clone(), ForceCurve::VisualLinear);
        let handle = start_sweep(bus.clone(), publisher.clone(), Duration::from_millis(1000));

        assert!(!publisher.is_enabled());
        assert_eq!(bus.force(Channel::Left), 1.0);
        publisher.publish_block(&[0i16; 32], 2);
        assert_eq!(bus.force(Channel::Right), 1.0);

        handle.await.unwrap();
        assert!(publisher.is_enabled());
        assert_eq!(bus.force(Channel::Left), 0.0);
    }
}
