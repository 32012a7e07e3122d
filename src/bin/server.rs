//! MoodChat server binary.

use std::process::ExitCode;

fn main() -> ExitCode {
    moodchat::startup::run()
}
