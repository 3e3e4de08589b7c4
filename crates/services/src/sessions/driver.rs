//! Event loop that drives a `SessionController` from a single task.
//!
//! One `select!` waits on the tick interval, the command channel and the
//! outstanding submission (if any). Commands that arrive while a submission is in
//! flight are still processed, and the controller turns submit triggers into no-ops.

use std::future::{Future, pending};
use std::pin::Pin;
use std::sync::Arc;

use backend::AttemptSubmitter;
use exam_core::model::{OptionLabel, QuestionId, SubmitAck};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::controller::{
    SessionController, SubmissionTicket, SubmitPrompt, SubmitTrigger, send_submission,
};
use super::guard::LeaveDecision;
use crate::error::SessionError;

const CHANNEL_CAPACITY: usize = 64;

/// Input from the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    SelectAnswer {
        question: QuestionId,
        label: OptionLabel,
    },
    Submit,
    ConfirmSubmit,
    CancelSubmit,
    Leave,
    ConfirmLeave,
    CancelLeave,
    Shutdown,
}

/// Output for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Tick { remaining_secs: u32 },
    TimeUp,
    ConfirmSubmit { answered: usize, total: usize },
    ConfirmLeave,
    Submitting { trigger: SubmitTrigger, elapsed_secs: u64 },
    Submitted { ack: SubmitAck },
    SubmitFailed { message: String },
    LeaveAllowed,
    Error { message: String },
}

type InFlight = Pin<Box<dyn Future<Output = Result<SubmitAck, SessionError>> + Send>>;

enum Step {
    Tick,
    Command(Option<SessionCommand>),
    Settled(Result<SubmitAck, SessionError>),
}

enum Flow {
    Continue,
    Stop,
}

/// Handle to a running session task.
#[derive(Debug)]
pub struct SessionHandle {
    pub commands: mpsc::Sender<SessionCommand>,
    pub events: mpsc::Receiver<SessionEvent>,
    pub task: JoinHandle<SessionController>,
}

/// Spawn the event loop on the current runtime. The task returns the controller
/// once the attempt is submitted, the user leaves, or `Shutdown` arrives.
#[must_use]
pub fn spawn_session(
    controller: SessionController,
    submitter: Arc<dyn AttemptSubmitter>,
) -> SessionHandle {
    let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let driver = SessionDriver {
        controller,
        submitter,
        commands: command_rx,
        events: event_tx,
    };
    SessionHandle {
        commands: command_tx,
        events: event_rx,
        task: tokio::spawn(driver.run()),
    }
}

struct SessionDriver {
    controller: SessionController,
    submitter: Arc<dyn AttemptSubmitter>,
    commands: mpsc::Receiver<SessionCommand>,
    events: mpsc::Sender<SessionEvent>,
}

impl SessionDriver {
    async fn run(mut self) -> SessionController {
        let mut interval = tokio::time::interval(self.controller.config().tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight: Option<InFlight> = None;

        loop {
            let step = tokio::select! {
                _ = interval.tick() => Step::Tick,
                command = self.commands.recv() => Step::Command(command),
                result = wait_for(&mut in_flight) => Step::Settled(result),
            };

            let flow = match step {
                Step::Tick => self.on_tick(&mut in_flight).await,
                Step::Command(None | Some(SessionCommand::Shutdown)) => Flow::Stop,
                Step::Command(Some(command)) => self.on_command(command, &mut in_flight).await,
                Step::Settled(result) => {
                    in_flight = None;
                    self.on_settled(result).await
                }
            };
            if matches!(flow, Flow::Stop) {
                break;
            }
        }

        debug!(status = %self.controller.status(), "session driver stopped");
        self.controller
    }

    async fn on_tick(&mut self, in_flight: &mut Option<InFlight>) -> Flow {
        if self.controller.attempt().started_at().is_none() {
            return Flow::Continue;
        }
        let expired_before = self.controller.is_time_up();
        match self.controller.tick() {
            Ok(outcome) => {
                // Ticks are droppable; a lagging reader must not stall the loop.
                let _ = self.events.try_send(SessionEvent::Tick {
                    remaining_secs: outcome.remaining_secs,
                });
                if outcome.time_up {
                    self.emit(SessionEvent::TimeUp).await;
                }
                if let Some(ticket) = outcome.submission {
                    self.launch(ticket, in_flight).await;
                }
            }
            Err(err) => {
                if !expired_before && self.controller.is_time_up() {
                    self.emit(SessionEvent::TimeUp).await;
                }
                self.emit(SessionEvent::Error {
                    message: err.user_message(),
                })
                .await;
            }
        }
        Flow::Continue
    }

    async fn on_command(
        &mut self,
        command: SessionCommand,
        in_flight: &mut Option<InFlight>,
    ) -> Flow {
        let result = match command {
            SessionCommand::SelectAnswer { question, label } => {
                self.controller.select_answer(question, label).map(|()| None)
            }
            SessionCommand::Submit => match self.controller.request_submit() {
                Ok(SubmitPrompt::Confirm { answered, total }) => {
                    self.emit(SessionEvent::ConfirmSubmit { answered, total })
                        .await;
                    Ok(None)
                }
                Ok(SubmitPrompt::Ready(ticket)) => Ok(Some(ticket)),
                Ok(SubmitPrompt::Ignored) => Ok(None),
                Err(err) => Err(err),
            },
            SessionCommand::ConfirmSubmit => self.controller.confirm_submit(),
            SessionCommand::CancelSubmit => {
                self.controller.cancel_submit();
                Ok(None)
            }
            SessionCommand::Leave => match self.controller.on_leave_requested() {
                LeaveDecision::Allow => {
                    self.emit(SessionEvent::LeaveAllowed).await;
                    return Flow::Stop;
                }
                LeaveDecision::Prompt => {
                    self.emit(SessionEvent::ConfirmLeave).await;
                    Ok(None)
                }
                LeaveDecision::Suppress => Ok(None),
            },
            SessionCommand::ConfirmLeave => {
                let ticket = self.controller.confirm_leave();
                if self.controller.leave_ready() {
                    self.emit(SessionEvent::LeaveAllowed).await;
                    return Flow::Stop;
                }
                ticket
            }
            SessionCommand::CancelLeave => {
                self.controller.cancel_leave();
                Ok(None)
            }
            SessionCommand::Shutdown => return Flow::Stop,
        };

        match result {
            Ok(Some(ticket)) => self.launch(ticket, in_flight).await,
            Ok(None) => {}
            Err(err) => {
                self.emit(SessionEvent::Error {
                    message: err.user_message(),
                })
                .await;
            }
        }
        Flow::Continue
    }

    async fn on_settled(&mut self, result: Result<SubmitAck, SessionError>) -> Flow {
        let ack = result.clone().ok();
        match self.controller.finish_submission(result) {
            Ok(()) => {
                self.emit(SessionEvent::Submitted {
                    ack: ack.unwrap_or_default(),
                })
                .await;
                if self.controller.leave_ready() {
                    self.emit(SessionEvent::LeaveAllowed).await;
                }
                Flow::Stop
            }
            Err(err) => {
                self.emit(SessionEvent::SubmitFailed {
                    message: err.user_message(),
                })
                .await;
                Flow::Continue
            }
        }
    }

    async fn launch(&mut self, ticket: SubmissionTicket, in_flight: &mut Option<InFlight>) {
        self.emit(SessionEvent::Submitting {
            trigger: ticket.trigger,
            elapsed_secs: ticket.request.elapsed_secs,
        })
        .await;
        let submitter = Arc::clone(&self.submitter);
        let timeout = self.controller.config().submit_timeout();
        let future: InFlight = Box::pin(send_submission(submitter, ticket.request, timeout));
        *in_flight = Some(future);
    }

    async fn emit(&self, event: SessionEvent) {
        if self.events.send(event).await.is_err() {
            debug!("session event receiver dropped");
        }
    }
}

async fn wait_for(slot: &mut Option<InFlight>) -> Result<SubmitAck, SessionError> {
    match slot {
        Some(future) => future.await,
        None => pending().await,
    }
}
