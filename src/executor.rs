use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    error::BridgeError,
    manager::ShowModelManager,
    model::cue::CueState,
};

/// Verbs a remote may apply to a single cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Start,
    Pause,
    Resume,
    TogglePause,
    Stop,
    Panic,
    Select,
}

impl Verb {
    pub fn from_token(token: &str) -> Option<Verb> {
        let verb = match token {
            "start" | "go" => Verb::Start,
            "pause" => Verb::Pause,
            "resume" => Verb::Resume,
            "togglePause" => Verb::TogglePause,
            "stop" => Verb::Stop,
            "panic" | "hardStop" => Verb::Panic,
            "select" => Verb::Select,
            _ => return None,
        };
        Some(verb)
    }
}

/// Instructions for the host execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Start(Uuid),
    Pause(Uuid),
    Resume(Uuid),
    Stop(Uuid),
    /// Immediate stop, no fade-out.
    Interrupt(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Start,
    Pause,
    Resume,
    Stop,
    Interrupt,
}

impl Action {
    fn command(self, cue_id: Uuid) -> EngineCommand {
        match self {
            Action::Start => EngineCommand::Start(cue_id),
            Action::Pause => EngineCommand::Pause(cue_id),
            Action::Resume => EngineCommand::Resume(cue_id),
            Action::Stop => EngineCommand::Stop(cue_id),
            Action::Interrupt => EngineCommand::Interrupt(cue_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Stay,
    Move(CueState, Action),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    NoOp,
}

/// Transition table. `None` means the verb does not apply in this state.
fn step(state: CueState, verb: Verb) -> Option<Step> {
    if state.contains(CueState::ERROR) {
        return None;
    }
    // A cue caught between running and paused counts as paused.
    let paused = state.contains(CueState::PAUSED);
    let running = state.contains(CueState::RUNNING) && !paused;

    let step = match verb {
        Verb::Start if running => Step::Stay,
        Verb::Start if paused => Step::Move(CueState::RUNNING, Action::Resume),
        Verb::Start => Step::Move(CueState::RUNNING, Action::Start),
        Verb::Pause if paused => Step::Stay,
        Verb::Pause => Step::Move(CueState::PAUSED, Action::Pause),
        Verb::Resume if paused => Step::Move(CueState::RUNNING, Action::Resume),
        Verb::Resume if running => Step::Stay,
        Verb::Resume => return None,
        Verb::TogglePause if paused => Step::Move(CueState::RUNNING, Action::Resume),
        Verb::TogglePause => Step::Move(CueState::PAUSED, Action::Pause),
        Verb::Stop | Verb::Panic if state.is_idle() => Step::Stay,
        Verb::Stop => Step::Move(CueState::IDLE, Action::Stop),
        Verb::Panic => Step::Move(CueState::IDLE, Action::Interrupt),
        Verb::Select => return None,
    };
    Some(step)
}

/// Applies verbs to cues: writes the resulting state to the host model and
/// forwards one command per transition to the execution engine.
#[derive(Clone)]
pub struct Executor {
    model_manager: ShowModelManager,
    engine_tx: mpsc::Sender<EngineCommand>,
}

impl Executor {
    pub fn new(model_manager: ShowModelManager, engine_tx: mpsc::Sender<EngineCommand>) -> Self {
        Self {
            model_manager,
            engine_tx,
        }
    }

    /// A cue in the error state rejects every verb with `Unhandled`, leaving
    /// the request to property handling.
    pub async fn apply(&self, cue_id: Uuid, verb: Verb) -> Result<Outcome, BridgeError> {
        let state = self
            .model_manager
            .get_cue_by_id(&cue_id)
            .await
            .map(|cue| cue.state)
            .ok_or_else(|| BridgeError::NotFound(cue_id.to_string()))?;

        if verb == Verb::Select {
            if state.contains(CueState::ERROR) {
                return Err(BridgeError::Unhandled(format!("cue '{}' is broken", cue_id)));
            }
            self.model_manager.set_standby(Some(cue_id)).await?;
            return Ok(Outcome::Applied);
        }

        match step(state, verb) {
            None => Err(BridgeError::Unhandled(format!(
                "{:?} on cue '{}' in state {}",
                verb, cue_id, state
            ))),
            Some(Step::Stay) => {
                log::debug!("{:?} on cue '{}' is a no-op in state {}.", verb, cue_id, state);
                Ok(Outcome::NoOp)
            }
            Some(Step::Move(next, action)) => {
                if let Err(e) = self.engine_tx.send(action.command(cue_id)).await {
                    log::error!("Execution engine is gone, dropping {:?}: {}", action, e);
                    return Err(BridgeError::Unhandled("execution engine unavailable".to_string()));
                }
                self.model_manager.set_cue_state(&cue_id, next).await?;
                Ok(Outcome::Applied)
            }
        }
    }

    /// Applies `verb` to each cue, skipping cues it does not apply to.
    /// Returns how many cues changed state.
    pub async fn apply_each(&self, cue_ids: &[Uuid], verb: Verb) -> usize {
        let mut applied = 0;
        for cue_id in cue_ids {
            match self.apply(*cue_id, verb).await {
                Ok(Outcome::Applied) => applied += 1,
                Ok(Outcome::NoOp) => {}
                Err(e) => log::debug!("Skipping cue '{}': {}", cue_id, e),
            }
        }
        applied
    }

    pub async fn apply_all(&self, verb: Verb) -> usize {
        let cue_ids: Vec<Uuid> = self
            .model_manager
            .read()
            .await
            .cues
            .iter()
            .map(|c| c.id)
            .collect();
        self.apply_each(&cue_ids, verb).await
    }

    /// Starts the standby cue and moves standby to the cue after it.
    pub async fn go(&self) -> Result<Outcome, BridgeError> {
        let standby = self
            .model_manager
            .standby()
            .await
            .ok_or_else(|| BridgeError::NotFound("no standby cue".to_string()))?;
        let outcome = self.apply(standby, Verb::Start).await?;

        let next = {
            let model = self.model_manager.read().await;
            model
                .index_of(&standby)
                .and_then(|i| model.cues.get(i + 1))
                .map(|c| c.id)
        };
        self.model_manager.set_standby(next).await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::{broadcast, mpsc::Receiver};

    use crate::{
        event::ModelEvent,
        model::cue::{Cue, CueKind},
    };

    async fn setup_executor(count: usize) -> (Executor, ShowModelManager, Receiver<EngineCommand>, Vec<Uuid>) {
        let (event_tx, _) = broadcast::channel::<ModelEvent>(32);
        let (engine_tx, engine_rx) = mpsc::channel::<EngineCommand>(32);
        let manager = ShowModelManager::new(event_tx);
        let mut ids = Vec::new();
        for i in 0..count {
            let cue = Cue::new(format!("Cue {}", i + 1), CueKind::Media);
            ids.push(cue.id);
            manager.add_cue(cue, None).await;
        }
        let executor = Executor::new(manager.clone(), engine_tx);
        (executor, manager, engine_rx, ids)
    }

    async fn state_of(manager: &ShowModelManager, cue_id: &Uuid) -> CueState {
        manager.get_cue_by_id(cue_id).await.unwrap().state
    }

    #[test]
    fn transition_table() {
        let paused = CueState::PAUSED;
        let running = CueState::RUNNING;
        let idle = CueState::IDLE;

        assert_eq!(step(idle, Verb::Start), Some(Step::Move(running, Action::Start)));
        assert_eq!(step(running, Verb::Start), Some(Step::Stay));
        assert_eq!(step(paused, Verb::Start), Some(Step::Move(running, Action::Resume)));
        assert_eq!(step(paused, Verb::Pause), Some(Step::Stay));
        assert_eq!(step(running | paused, Verb::Resume), Some(Step::Move(running, Action::Resume)));
        assert_eq!(step(idle, Verb::Resume), None);
        assert_eq!(step(idle, Verb::TogglePause), Some(Step::Move(paused, Action::Pause)));
        assert_eq!(step(paused, Verb::TogglePause), Some(Step::Move(running, Action::Resume)));
        assert_eq!(step(idle, Verb::Stop), Some(Step::Stay));
        assert_eq!(step(paused, Verb::Stop), Some(Step::Move(idle, Action::Stop)));
        assert_eq!(step(running, Verb::Panic), Some(Step::Move(idle, Action::Interrupt)));
        assert_eq!(step(running | CueState::ERROR, Verb::Stop), None);
    }

    #[tokio::test]
    async fn start_twice_stays_running() {
        let (executor, manager, mut engine_rx, ids) = setup_executor(1).await;

        assert_eq!(executor.apply(ids[0], Verb::Start).await, Ok(Outcome::Applied));
        assert_eq!(executor.apply(ids[0], Verb::Start).await, Ok(Outcome::NoOp));

        assert_eq!(state_of(&manager, &ids[0]).await, CueState::RUNNING);
        assert_eq!(engine_rx.recv().await, Some(EngineCommand::Start(ids[0])));
        assert!(engine_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stop_on_idle_is_a_no_op() {
        let (executor, _, mut engine_rx, ids) = setup_executor(1).await;
        assert_eq!(executor.apply(ids[0], Verb::Stop).await, Ok(Outcome::NoOp));
        assert!(engine_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn panic_interrupts() {
        let (executor, manager, mut engine_rx, ids) = setup_executor(1).await;
        executor.apply(ids[0], Verb::Start).await.unwrap();
        executor.apply(ids[0], Verb::Panic).await.unwrap();

        assert_eq!(state_of(&manager, &ids[0]).await, CueState::IDLE);
        assert_eq!(engine_rx.recv().await, Some(EngineCommand::Start(ids[0])));
        assert_eq!(engine_rx.recv().await, Some(EngineCommand::Interrupt(ids[0])));
    }

    #[tokio::test]
    async fn broken_cue_rejects_verbs() {
        let (executor, manager, mut engine_rx, ids) = setup_executor(1).await;
        manager.set_cue_state(&ids[0], CueState::ERROR).await.unwrap();

        for verb in [Verb::Start, Verb::Stop, Verb::Panic, Verb::Select] {
            assert!(matches!(
                executor.apply(ids[0], verb).await,
                Err(BridgeError::Unhandled(_))
            ));
        }
        assert!(engine_rx.try_recv().is_err());
        assert_eq!(state_of(&manager, &ids[0]).await, CueState::ERROR);
    }

    #[tokio::test]
    async fn go_advances_standby() {
        let (executor, manager, mut engine_rx, ids) = setup_executor(2).await;
        assert!(matches!(executor.go().await, Err(BridgeError::NotFound(_))));

        manager.set_standby(Some(ids[0])).await.unwrap();
        executor.go().await.unwrap();
        assert_eq!(manager.standby().await, Some(ids[1]));
        executor.go().await.unwrap();
        assert_eq!(manager.standby().await, None);

        assert_eq!(engine_rx.recv().await, Some(EngineCommand::Start(ids[0])));
        assert_eq!(engine_rx.recv().await, Some(EngineCommand::Start(ids[1])));
    }

    #[tokio::test]
    async fn select_sets_standby() {
        let (executor, manager, _engine_rx, ids) = setup_executor(3).await;
        assert_eq!(executor.apply(ids[2], Verb::Select).await, Ok(Outcome::Applied));
        assert_eq!(manager.standby().await, Some(ids[2]));
    }

    #[tokio::test]
    async fn stop_all() {
        let (executor, manager, _engine_rx, ids) = setup_executor(3).await;
        executor.apply(ids[0], Verb::Start).await.unwrap();
        executor.apply(ids[2], Verb::Pause).await.unwrap();

        assert_eq!(executor.apply_all(Verb::Stop).await, 2);
        for id in &ids {
            assert_eq!(state_of(&manager, id).await, CueState::IDLE);
        }
    }
}
