//! Presentation side effects behind a seam that can never fail a mark.

/// Sink for operator-facing side effects: welcome announcements and status
/// lines. Implementations swallow their own failures; a broken notification
/// channel must never block or fail the underlying attendance mutation.
pub trait Notifier: Send {
    fn welcome(&mut self, name: &str);
    fn status(&mut self, message: &str);
}

/// Default notifier: plain console output.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn welcome(&mut self, name: &str) {
        println!("Welcome {name}");
    }

    fn status(&mut self, message: &str) {
        println!("{message}");
    }
}
