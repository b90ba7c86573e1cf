//! Line-oriented terminal front end: birth-details intake, session list,
//! transcript and incremental rendering of streamed replies.

mod command;
pub mod render;

pub use command::{ parse_input, Input, ShellCommand };
pub use render::{ Delta, ReplyView, SUGGESTED_QUESTIONS };

use crate::error::ChatError;
use crate::models::profile::BirthProfile;
use crate::reconciler::{ Activity, ChatController, Update };
use chrono::Utc;
use log::{ debug, info, warn };
use std::error::Error;
use std::io::Write;
use tokio::io::{ AsyncBufReadExt, AsyncRead, BufReader, Lines };

type ShellResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

enum Step {
    Line(Option<String>),
    Activity(Activity),
}

pub struct Shell<R, W> {
    controller: ChatController,
    input: Lines<BufReader<R>>,
    out: W,
    view: ReplyView,
    input_closed: bool,
}

impl<R, W> Shell<R, W> where R: AsyncRead + Unpin, W: Write {
    pub fn new(controller: ChatController, input: R, out: W) -> Self {
        Self {
            controller,
            input: BufReader::new(input).lines(),
            out,
            view: ReplyView::default(),
            input_closed: false,
        }
    }

    pub fn controller(&self) -> &ChatController {
        &self.controller
    }

    pub fn into_parts(self) -> (ChatController, W) {
        (self.controller, self.out)
    }

    /// Runs until `/quit`, or until input ends and the open reply (if any)
    /// has finished.
    pub async fn run(&mut self) -> ShellResult<()> {
        if self.controller.profile()?.is_none() {
            writeln!(self.out, "Welcome. Tell us when and where you were born.")?;
            if !self.intake().await? {
                return Ok(());
            }
        }

        writeln!(self.out, "Ask anything about your chart. Type /help for commands.")?;
        self.list_sessions().await?;
        self.offer_suggestions()?;

        loop {
            let busy = self.controller.has_activity();
            if self.input_closed && !busy {
                break;
            }
            let step =
                tokio::select! {
                biased;
                activity = self.controller.next_activity(), if busy => match activity {
                    Some(activity) => Step::Activity(activity),
                    None => continue,
                },
                line = self.input.next_line(), if !self.input_closed => Step::Line(line?),
                else => break,
            };

            match step {
                Step::Activity(activity) => self.on_activity(activity).await?,
                Step::Line(Some(line)) => {
                    if !self.on_line(&line).await? {
                        break;
                    }
                }
                Step::Line(None) => {
                    debug!("Input closed");
                    self.input_closed = true;
                }
            }
        }

        self.controller.shutdown();
        self.out.flush()?;
        Ok(())
    }

    async fn read_line(&mut self, prompt: &str) -> ShellResult<Option<String>> {
        write!(self.out, "{}", prompt)?;
        self.out.flush()?;
        let line = self.input.next_line().await?;
        if line.is_none() {
            self.input_closed = true;
        }
        Ok(line.map(|l| l.trim().to_string()))
    }

    async fn read_coordinate(&mut self, prompt: &str, what: &str) -> ShellResult<Option<f64>> {
        loop {
            let Some(raw) = self.read_line(prompt).await? else {
                return Ok(None);
            };
            match raw.parse::<f64>() {
                Ok(value) => {
                    return Ok(Some(value));
                }
                Err(_) => self.notify(&ChatError::validation(format!("{} must be a number", what)))?,
            }
        }
    }

    /// Collects and saves the birth profile, asking again until it is
    /// valid. Returns false if input ended first.
    async fn intake(&mut self) -> ShellResult<bool> {
        loop {
            let Some(date) = self.read_line("Birth date (YYYY-MM-DD): ").await? else {
                return Ok(false);
            };
            let Some(time) = self.read_line("Birth time (HH:MM): ").await? else {
                return Ok(false);
            };
            let Some(latitude) = self.read_coordinate("Latitude: ", "Latitude").await? else {
                return Ok(false);
            };
            let Some(longitude) = self.read_coordinate("Longitude: ", "Longitude").await? else {
                return Ok(false);
            };

            let profile = BirthProfile::new(date, time, latitude, longitude);
            match self.controller.save_profile(&profile) {
                Ok(()) => {
                    writeln!(self.out, "Saved. {}", render::profile_line(&profile))?;
                    return Ok(true);
                }
                Err(e @ ChatError::ValidationFailed(_)) => self.notify(&e)?,
                Err(e) => {
                    return Err(e.into());
                }
            }
        }
    }

    /// Handles one line of input. Returns false when the user quits.
    async fn on_line(&mut self, line: &str) -> ShellResult<bool> {
        let input = match parse_input(line) {
            Ok(input) => input,
            Err(e) => {
                self.notify(&e)?;
                return Ok(true);
            }
        };
        match input {
            Input::Empty => {}
            Input::Message(text) => self.send(&text).await?,
            Input::Command(command) => {
                return self.on_command(command).await;
            }
        }
        Ok(true)
    }

    async fn on_command(&mut self, command: ShellCommand) -> ShellResult<bool> {
        match command {
            ShellCommand::New => {
                self.end_reply()?;
                self.controller.new_chat();
                writeln!(self.out, "Started a new consultation.")?;
                self.offer_suggestions()?;
            }
            ShellCommand::List => self.list_sessions().await?,
            ShellCommand::Open(id) => {
                self.end_reply()?;
                match self.controller.select_session(id).await {
                    Ok(session) => {
                        let title = session.display_title().to_string();
                        writeln!(self.out, "--- {} ---", title)?;
                        self.print_transcript()?;
                    }
                    Err(e) => self.notify(&e)?,
                }
            }
            ShellCommand::Profile => {
                if self.controller.is_sending() {
                    writeln!(self.out, "Wait for the current reply before changing your birth details.")?;
                    return Ok(true);
                }
                if let Some(profile) = self.controller.profile()? {
                    writeln!(self.out, "Current: {}", render::profile_line(&profile))?;
                }
                self.intake().await?;
            }
            ShellCommand::Suggest(None) => {
                writeln!(self.out, "Suggested questions:")?;
                for line in render::suggestion_lines() {
                    writeln!(self.out, "{}", line)?;
                }
            }
            ShellCommand::Suggest(Some(n)) => {
                match SUGGESTED_QUESTIONS.get(n - 1) {
                    Some(question) => {
                        writeln!(self.out, "{}{}", render::USER_LABEL, question)?;
                        self.send(question).await?;
                    }
                    None =>
                        self.notify(
                            &ChatError::validation(format!("There are only {} suggestions", SUGGESTED_QUESTIONS.len()))
                        )?,
                }
            }
            ShellCommand::Help => writeln!(self.out, "{}", render::HELP)?,
            ShellCommand::Quit => {
                info!("Leaving consultation");
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn send(&mut self, text: &str) -> ShellResult<()> {
        if self.controller.is_sending() {
            writeln!(self.out, "Still waiting for the astrologer; message ignored.")?;
            return Ok(());
        }
        match self.controller.submit(text).await {
            Ok(_) => {}
            Err(e @ ChatError::Storage(_)) => {
                return Err(e.into());
            }
            Err(e) => self.notify(&e)?,
        }
        Ok(())
    }

    async fn on_activity(&mut self, activity: Activity) -> ShellResult<()> {
        match self.controller.handle(activity).await {
            Ok(Update::Reply { content, .. }) => self.draw(&content)?,
            Ok(Update::Completed { content, .. }) => {
                match content {
                    Some(text) => {
                        self.draw(&text)?;
                        self.end_reply()?;
                    }
                    None => {
                        self.end_reply()?;
                        writeln!(self.out, "(The astrologer had nothing to add.)")?;
                    }
                }
            }
            Ok(Update::Continued) | Ok(Update::Ignored) => {}
            Err(e) => {
                self.end_reply()?;
                self.notify(&e)?;
            }
        }
        Ok(())
    }

    fn draw(&mut self, content: &str) -> ShellResult<()> {
        match self.view.update(content) {
            Delta::Start(text) => write!(self.out, "{}{}", render::ASSISTANT_LABEL, text)?,
            Delta::Extend(tail) => write!(self.out, "{}", tail)?,
            Delta::Rewrite(text) => write!(self.out, "\n{}{}", render::ASSISTANT_LABEL, text)?,
            Delta::Unchanged => {}
        }
        self.out.flush()?;
        Ok(())
    }

    fn end_reply(&mut self) -> ShellResult<()> {
        if self.view.finish() {
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn notify(&mut self, error: &ChatError) -> ShellResult<()> {
        writeln!(self.out, "! {}", error)?;
        Ok(())
    }

    async fn list_sessions(&mut self) -> ShellResult<()> {
        if let Err(e) = self.controller.refresh_sessions().await {
            warn!("Could not load chat list: {}", e);
            return self.notify(&e);
        }
        let current = self.controller.current().map(|s| s.id);
        let now = Utc::now();
        if self.controller.sessions().is_empty() {
            writeln!(self.out, "No previous consultations.")?;
            return Ok(());
        }
        writeln!(self.out, "Your consultations:")?;
        for session in self.controller.sessions() {
            writeln!(self.out, "{}", render::session_line(session, current, now))?;
        }
        Ok(())
    }

    fn offer_suggestions(&mut self) -> ShellResult<()> {
        if !self.controller.transcript().is_empty() {
            return Ok(());
        }
        writeln!(self.out, "Not sure where to start? Try /suggest <n>:")?;
        for line in render::suggestion_lines() {
            writeln!(self.out, "{}", line)?;
        }
        Ok(())
    }

    fn print_transcript(&mut self) -> ShellResult<()> {
        for message in self.controller.transcript().messages() {
            writeln!(self.out, "{}", render::message_line(message))?;
        }
        Ok(())
    }
}
