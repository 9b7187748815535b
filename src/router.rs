use std::time::Instant;

use serde_json::{Value, json};

use crate::{
    container::{Container, CueContainer},
    error::BridgeError,
    executor::{Executor, Verb},
    manager::ShowModelManager,
    model::cue::CueState,
    properties::{self, Mutation, Property, Subject, Target},
    protocol::{Argument, Envelope, Outbound, PROTOCOL_VERSION, Request, Status, join_path, split_path},
    registry::ClientRegistry,
    resolver::{self, Resolved},
    session::{SessionHandle, Workspace},
};

type Handled = Result<Option<Value>, BridgeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TopVerb {
    Version,
    Workspaces,
    Connect,
    Disconnect,
    Updates,
    AlwaysReply,
    Thump,
    Go,
    /// Workspace-wide `stop`, `pause`, `resume` and `panic`.
    All(Verb),
    Select,
    SelectId,
    CueLists,
    SelectedCues,
    RunningCues,
    Cue,
    CueId,
}

impl TopVerb {
    fn from_token(token: &str) -> Option<TopVerb> {
        let verb = match token {
            "version" => TopVerb::Version,
            "workspaces" => TopVerb::Workspaces,
            "connect" => TopVerb::Connect,
            "disconnect" => TopVerb::Disconnect,
            "updates" => TopVerb::Updates,
            "alwaysReply" => TopVerb::AlwaysReply,
            "thump" => TopVerb::Thump,
            "go" => TopVerb::Go,
            "stop" => TopVerb::All(Verb::Stop),
            "pause" => TopVerb::All(Verb::Pause),
            "resume" => TopVerb::All(Verb::Resume),
            "panic" => TopVerb::All(Verb::Panic),
            "select" => TopVerb::Select,
            "select_id" => TopVerb::SelectId,
            "cueLists" => TopVerb::CueLists,
            "selectedCues" => TopVerb::SelectedCues,
            "runningCues" => TopVerb::RunningCues,
            "cue" => TopVerb::Cue,
            "cue_id" => TopVerb::CueId,
            _ => return None,
        };
        Some(verb)
    }
}

fn flag_argument(args: &[Argument]) -> Result<bool, BridgeError> {
    args.first()
        .and_then(Argument::as_bool)
        .ok_or_else(|| BridgeError::Malformed("expected a 0/1 argument".to_string()))
}

#[derive(Clone)]
pub struct Router {
    model_manager: ShowModelManager,
    executor: Executor,
    registry: ClientRegistry,
    session: SessionHandle,
}

impl Router {
    pub fn new(
        model_manager: ShowModelManager,
        executor: Executor,
        registry: ClientRegistry,
        session: SessionHandle,
    ) -> Self {
        Self {
            model_manager,
            executor,
            registry,
            session,
        }
    }

    pub async fn handle(&self, request: Request) {
        self.handle_at(request, Instant::now()).await
    }

    /// Serves one request as if it arrived at `now`.
    pub async fn handle_at(&self, request: Request, now: Instant) {
        if self
            .registry
            .is_retransmission(request.sender, &request.path, &request.args, now)
            .await
        {
            log::debug!("Ignoring retransmitted '{}' from {}.", request.path, request.sender);
            return;
        }

        let wanted_before = self.registry.wants_empty_replies(&request.sender).await;
        let (result, workspace_id) = self.route(&request).await;
        let (status, data) = match result {
            Ok(data) => (Status::Ok, data),
            Err(e) => {
                log::debug!("'{}' from {} failed: {}", request.path, request.sender, e);
                (Status::NotOk, None)
            }
        };

        if status == Status::Ok
            && data.is_none()
            && !wanted_before
            && !self.registry.wants_empty_replies(&request.sender).await
        {
            log::trace!("Suppressing empty reply to {} for '{}'.", request.sender, request.path);
            return;
        }

        let reply = Outbound::reply(Envelope {
            address: request.path.clone(),
            status,
            workspace_id,
            data,
        });
        if request.reply_tx.send(reply).is_err() {
            log::warn!("Reply channel to {} is closed.", request.sender);
        }
    }

    /// Returns the outcome plus the session id to echo, which is only set
    /// when the request was scoped to the open session.
    async fn route(&self, request: &Request) -> (Handled, Option<String>) {
        let tokens = split_path(&request.path);
        let current = self.session.current().await;

        let (rest, scoped) = match tokens.as_slice() {
            ["workspace", scope, rest @ ..] => match &current {
                Some(workspace) if workspace.session.matches_scope(scope) => (rest, true),
                Some(_) => return (Err(BridgeError::UnauthorizedScope(scope.to_string())), None),
                None => return (Err(BridgeError::NoSession), None),
            },
            ["workspace"] => {
                return (Err(BridgeError::Malformed("missing workspace scope".to_string())), None);
            }
            rest => (rest, false),
        };

        let workspace_id = current
            .as_ref()
            .filter(|_| scoped)
            .map(|w| w.session.id().to_string());
        (self.dispatch(request, rest, current.as_ref()).await, workspace_id)
    }

    async fn dispatch(&self, request: &Request, tokens: &[&str], workspace: Option<&Workspace>) -> Handled {
        let (head, tail) = tokens
            .split_first()
            .ok_or_else(|| BridgeError::Malformed("empty address".to_string()))?;
        let verb = TopVerb::from_token(head)
            .ok_or_else(|| BridgeError::Unhandled(format!("unknown verb '{}'", head)))?;
        let open = || workspace.ok_or(BridgeError::NoSession);

        match verb {
            TopVerb::Version => Ok(Some(json!(PROTOCOL_VERSION))),
            TopVerb::Workspaces => Ok(Some(Value::Array(
                workspace.map(|w| w.session.describe()).into_iter().collect(),
            ))),
            TopVerb::Connect => {
                self.registry.connect(request.sender, request.reply_tx.clone()).await;
                Ok(Some(json!("ok")))
            }
            TopVerb::Disconnect => {
                self.registry.disconnect(&request.sender).await;
                Ok(None)
            }
            TopVerb::Updates => {
                let enabled = flag_argument(&request.args)?;
                self.registry.set_updates(&request.sender, enabled).await?;
                Ok(None)
            }
            TopVerb::AlwaysReply => {
                let enabled = flag_argument(&request.args)?;
                self.registry.set_always_reply(&request.sender, enabled).await?;
                Ok(None)
            }
            TopVerb::Thump => Ok(Some(json!("thump"))),
            TopVerb::Go => {
                open()?;
                self.executor.go().await?;
                Ok(None)
            }
            TopVerb::All(verb) => {
                open()?;
                let applied = self.executor.apply_all(verb).await;
                log::debug!("Workspace {:?} changed {} cue(s).", verb, applied);
                Ok(None)
            }
            TopVerb::Select => {
                let (resolved, _) = self.resolve_number(open()?, tail).await?;
                self.select(resolved).await
            }
            TopVerb::SelectId => {
                let resolved = self.resolve_id(open()?, tail).await?;
                self.select(resolved).await
            }
            TopVerb::CueLists => Ok(Some(self.cue_lists(open()?).await)),
            TopVerb::SelectedCues => Ok(Some(self.selected_cues(open()?).await)),
            TopVerb::RunningCues => Ok(Some(self.running_cues(open()?).await)),
            TopVerb::Cue => {
                let workspace = open()?;
                let (resolved, consumed) = self.resolve_number(workspace, tail).await?;
                self.handle_target(workspace, resolved, &tail[consumed..], &request.args)
                    .await
            }
            TopVerb::CueId => {
                let workspace = open()?;
                let resolved = self.resolve_id(workspace, tail).await?;
                self.handle_target(workspace, resolved, &tail[1..], &request.args)
                    .await
            }
        }
    }

    async fn resolve_number(
        &self,
        workspace: &Workspace,
        tokens: &[&str],
    ) -> Result<(Resolved, usize), BridgeError> {
        let model = self.model_manager.read().await;
        resolver::resolve_number(&model, workspace.containers(), tokens)
    }

    async fn resolve_id(&self, workspace: &Workspace, tokens: &[&str]) -> Result<Resolved, BridgeError> {
        let token = tokens
            .first()
            .ok_or_else(|| BridgeError::Malformed("missing cue id".to_string()))?;
        let model = self.model_manager.read().await;
        resolver::resolve_id(&model, workspace.containers(), token)
    }

    async fn select(&self, resolved: Resolved) -> Handled {
        match resolved {
            Resolved::Cue(cue_id) => {
                self.executor.apply(cue_id, Verb::Select).await?;
                Ok(None)
            }
            Resolved::Container(id) => Err(BridgeError::Unhandled(format!(
                "container '{}' cannot be selected",
                id
            ))),
        }
    }

    /// Per-target commands: a bulk read, a verb, or a property get or set.
    async fn handle_target(
        &self,
        workspace: &Workspace,
        resolved: Resolved,
        tokens: &[&str],
        args: &[Argument],
    ) -> Handled {
        let Some((command, extra)) = tokens.split_first() else {
            return self.describe(workspace, resolved).await.map(Some);
        };
        if !extra.is_empty() {
            return Err(BridgeError::Malformed(format!(
                "unexpected trailing tokens '{}'",
                join_path(extra)
            )));
        }

        if *command == "valuesForKeys" {
            return self.values_for_keys(workspace, resolved, args).await.map(Some);
        }

        if let Some(value) = args.first() {
            let mutation = self.mutation_for(workspace, resolved, command, value).await?;
            self.apply_mutation(mutation).await?;
            return Ok(None);
        }

        if let Some(verb) = Verb::from_token(command) {
            match self.apply_verb(workspace, resolved, verb).await {
                Err(BridgeError::Unhandled(reason)) => {
                    log::debug!("'{}' not applied ({}), trying it as a property.", command, reason);
                }
                other => return other.map(|_| None),
            }
        }
        self.get_property(workspace, resolved, command).await.map(Some)
    }

    async fn apply_verb(&self, workspace: &Workspace, resolved: Resolved, verb: Verb) -> Result<(), BridgeError> {
        let container_id = match resolved {
            Resolved::Cue(cue_id) => return self.executor.apply(cue_id, verb).await.map(|_| ()),
            Resolved::Container(id) => id,
        };

        let (is_sequence, cue_ids) = {
            let model = self.model_manager.read().await;
            let container = workspace
                .containers()
                .by_id(&container_id)
                .ok_or_else(|| BridgeError::NotFound(container_id.to_string()))?;
            (
                matches!(container, Container::Sequence(_)),
                container.cue_ids(&model),
            )
        };

        match verb {
            Verb::Start if is_sequence => self.executor.go().await.map(|_| ()),
            Verb::Start | Verb::Select => Err(BridgeError::Unhandled(format!(
                "{:?} on container '{}'",
                verb, container_id
            ))),
            _ => {
                let applied = self.executor.apply_each(&cue_ids, verb).await;
                log::debug!("{:?} on container '{}' changed {} cue(s).", verb, container_id, applied);
                Ok(())
            }
        }
    }

    fn property(name: &str) -> Result<Property, BridgeError> {
        Property::from_name(name)
            .ok_or_else(|| BridgeError::Unhandled(format!("unknown property '{}'", name)))
    }

    async fn get_property(&self, workspace: &Workspace, resolved: Resolved, name: &str) -> Result<Value, BridgeError> {
        let property = Self::property(name)?;
        let model = self.model_manager.read().await;
        let subject = Subject::new(&model, workspace.containers(), resolved)?;
        property
            .get(&subject)
            .ok_or_else(|| BridgeError::Unhandled(format!("'{}' does not apply here", name)))
    }

    async fn mutation_for(
        &self,
        workspace: &Workspace,
        resolved: Resolved,
        name: &str,
        value: &Argument,
    ) -> Result<Mutation, BridgeError> {
        let property = Self::property(name)?;
        let model = self.model_manager.read().await;
        let subject = Subject::new(&model, workspace.containers(), resolved)?;
        property.set(&subject, value)
    }

    async fn apply_mutation(&self, mutation: Mutation) -> Result<(), BridgeError> {
        log::debug!("Applying {:?}.", mutation);
        match mutation {
            Mutation::Name(cue_id, name) => self.model_manager.set_cue_name(&cue_id, &name).await,
            Mutation::Notes(cue_id, notes) => self.model_manager.set_cue_notes(&cue_id, &notes).await,
            Mutation::Standby(cue_id) => self.model_manager.set_standby(cue_id).await,
        }
    }

    async fn values_for_keys(&self, workspace: &Workspace, resolved: Resolved, args: &[Argument]) -> Result<Value, BridgeError> {
        let raw = args
            .first()
            .map(Argument::as_text)
            .ok_or_else(|| BridgeError::Malformed("valuesForKeys needs a key list".to_string()))?;
        let keys: Vec<String> = serde_json::from_str(&raw)
            .map_err(|e| BridgeError::Malformed(format!("bad key list '{}': {}", raw, e)))?;

        let model = self.model_manager.read().await;
        let subject = Subject::new(&model, workspace.containers(), resolved)?;
        Ok(Value::Object(properties::values_for_keys(&subject, &keys)))
    }

    async fn describe(&self, workspace: &Workspace, resolved: Resolved) -> Result<Value, BridgeError> {
        let model = self.model_manager.read().await;
        let subject = Subject::new(&model, workspace.containers(), resolved)?;
        Ok(properties::summary(&subject))
    }

    async fn cue_lists(&self, workspace: &Workspace) -> Value {
        let model = self.model_manager.read().await;
        let containers = workspace.containers();
        containers
            .iter()
            .map(|container| {
                properties::summary(&Subject {
                    model: &model,
                    containers,
                    target: Target::Container(container),
                })
            })
            .collect()
    }

    async fn selected_cues(&self, workspace: &Workspace) -> Value {
        let model = self.model_manager.read().await;
        let containers = workspace.containers();
        containers
            .sequence()
            .and_then(|sequence| sequence.standby(&model))
            .and_then(|id| model.cue(&id))
            .map(|cue| {
                properties::summary(&Subject {
                    model: &model,
                    containers,
                    target: Target::Cue(cue),
                })
            })
            .into_iter()
            .collect()
    }

    async fn running_cues(&self, workspace: &Workspace) -> Value {
        let model = self.model_manager.read().await;
        let containers = workspace.containers();
        containers
            .flat_cue_ids(&model)
            .iter()
            .filter_map(|id| model.cue(id))
            .filter(|cue| cue.state.contains(CueState::RUNNING))
            .map(|cue| {
                properties::summary(&Subject {
                    model: &model,
                    containers,
                    target: Target::Cue(cue),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::sync::{
        broadcast,
        mpsc::{self, Receiver, UnboundedReceiver, UnboundedSender},
    };
    use uuid::Uuid;

    use crate::{
        broadcaster::Broadcaster,
        event::ModelEvent,
        executor::EngineCommand,
        model::cue::{Cue, CueKind},
        protocol::ClientId,
    };

    struct Fixture {
        router: Router,
        manager: ShowModelManager,
        registry: ClientRegistry,
        session: SessionHandle,
        session_id: String,
        ids: Vec<Uuid>,
        client: ClientId,
        reply_tx: UnboundedSender<Outbound>,
        reply_rx: UnboundedReceiver<Outbound>,
        clock: Instant,
        _engine_rx: Receiver<EngineCommand>,
    }

    impl Fixture {
        /// Each call arrives well outside the debounce window of the previous one.
        async fn send(&mut self, path: &str, args: Vec<Argument>) -> Option<Outbound> {
            self.clock += Duration::from_secs(1);
            let now = self.clock;
            self.send_at(path, args, now).await
        }

        async fn send_at(&mut self, path: &str, args: Vec<Argument>, now: Instant) -> Option<Outbound> {
            let request = Request {
                path: path.to_string(),
                args,
                sender: self.client,
                reply_tx: self.reply_tx.clone(),
            };
            self.router.handle_at(request, now).await;
            self.reply_rx.try_recv().ok()
        }

        fn scoped(&self, path: &str) -> String {
            format!("/workspace/{}{}", self.session_id, path)
        }

        async fn name_of(&self, index: usize) -> String {
            self.manager.get_cue_by_id(&self.ids[index]).await.unwrap().name
        }
    }

    async fn setup_router(count: usize) -> Fixture {
        let (event_tx, _) = broadcast::channel::<ModelEvent>(64);
        let (engine_tx, engine_rx) = mpsc::channel::<EngineCommand>(64);
        let manager = ShowModelManager::new(event_tx);
        let mut ids = Vec::new();
        for i in 0..count {
            let cue = Cue::new(format!("Cue {}", i + 1), CueKind::Media);
            ids.push(cue.id);
            manager.add_cue(cue, None).await;
        }

        let registry = ClientRegistry::new(Duration::from_millis(50));
        let session = SessionHandle::new();
        let session_id = {
            let model = manager.read().await;
            session.open("Main Show", &model, &registry).await
        };
        let executor = Executor::new(manager.clone(), engine_tx);
        let router = Router::new(manager.clone(), executor, registry.clone(), session.clone());
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();

        Fixture {
            router,
            manager,
            registry,
            session,
            session_id,
            ids,
            client: ClientId("192.168.1.20:50123".parse().unwrap()),
            reply_tx,
            reply_rx,
            clock: Instant::now(),
            _engine_rx: engine_rx,
        }
    }

    /// A client that has connected and asked for every reply.
    async fn setup_connected(count: usize) -> Fixture {
        let mut fixture = setup_router(count).await;
        fixture.send("/connect", vec![]).await.unwrap();
        let ack = fixture.send("/alwaysReply", vec![Argument::Int(1)]).await.unwrap();
        assert_eq!(ack.envelope.status, Status::Ok);
        fixture
    }

    #[tokio::test]
    async fn version_and_workspaces() {
        let mut fixture = setup_router(0).await;
        let version = fixture.send("/version", vec![]).await.unwrap();
        assert_eq!(version.path, "/reply/version");
        assert_eq!(version.envelope.data, Some(json!(PROTOCOL_VERSION)));

        let workspaces = fixture.send("/workspaces", vec![]).await.unwrap();
        let data = workspaces.envelope.data.unwrap();
        assert_eq!(data[0]["uniqueID"], json!(fixture.session_id));
        assert_eq!(data[0]["displayName"], json!("Main Show"));
    }

    #[tokio::test]
    async fn wrong_workspace_is_rejected_without_an_id() {
        let mut fixture = setup_connected(2).await;
        let reply = fixture.send("/workspace/not-a-session/go", vec![]).await.unwrap();
        assert_eq!(reply.envelope.status, Status::NotOk);
        assert_eq!(reply.envelope.workspace_id, None);
        assert_eq!(reply.path, "/reply/workspace/not-a-session/go");
    }

    #[tokio::test]
    async fn scope_by_display_name() {
        let mut fixture = setup_connected(1).await;
        let reply = fixture
            .send("/workspace/Main Show/cue/1/name", vec![])
            .await
            .unwrap();
        assert_eq!(reply.envelope.status, Status::Ok);
        assert_eq!(reply.envelope.data, Some(json!("Cue 1")));
        assert_eq!(reply.envelope.workspace_id.as_deref(), Some(fixture.session_id.as_str()));
    }

    #[tokio::test]
    async fn set_name_by_number() {
        let mut fixture = setup_connected(3).await;
        let path = fixture.scoped("/cue/3/name");
        let reply = fixture
            .send(&path, vec![Argument::Str("Foo".to_string())])
            .await
            .unwrap();
        assert_eq!(reply.envelope.status, Status::Ok);
        assert_eq!(reply.envelope.workspace_id.as_deref(), Some(fixture.session_id.as_str()));
        assert_eq!(fixture.name_of(2).await, "Foo");
        assert_eq!(fixture.name_of(0).await, "Cue 1");
    }

    #[tokio::test]
    async fn read_only_properties_are_refused() {
        let mut fixture = setup_connected(1).await;
        let reply = fixture
            .send("/cue/1/duration", vec![Argument::Float(3.0)])
            .await
            .unwrap();
        assert_eq!(reply.envelope.status, Status::NotOk);
    }

    #[tokio::test]
    async fn id_and_number_agree() {
        let mut fixture = setup_connected(3).await;
        let id = fixture.ids[1].to_string();
        let by_number = fixture.send("/cue/2/uniqueID", vec![]).await.unwrap();
        assert_eq!(by_number.envelope.data, Some(json!(id)));

        let path = format!("/cue_id/{}/number", id);
        let by_id = fixture.send(&path, vec![]).await.unwrap();
        assert_eq!(by_id.envelope.data, Some(json!("2")));
    }

    #[tokio::test]
    async fn cue_number_zero_is_malformed() {
        let mut fixture = setup_connected(1).await;
        for path in ["/cue/0/name", "/cue/-1/name", "/cue/abc/name", "/cue/9/name"] {
            let reply = fixture.send(path, vec![]).await.unwrap();
            assert_eq!(reply.envelope.status, Status::NotOk, "{}", path);
        }
    }

    #[tokio::test]
    async fn retransmission_gets_one_reply() {
        let mut fixture = setup_connected(1).await;
        let t0 = fixture.clock + Duration::from_secs(10);
        let first = fixture.send_at("/cue/1/name", vec![], t0).await;
        let second = fixture
            .send_at("/cue/1/name", vec![], t0 + Duration::from_millis(5))
            .await;
        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn empty_replies_are_suppressed_without_flags() {
        let mut fixture = setup_router(1).await;
        fixture.send("/connect", vec![]).await.unwrap();
        assert!(fixture.send("/cue/1/start", vec![]).await.is_none());
        assert!(fixture.send("/cue/1/nope", vec![]).await.is_some());
        assert!(fixture.send("/cue/1/name", vec![]).await.is_some());
    }

    #[tokio::test]
    async fn start_twice_and_stop_on_idle() {
        let mut fixture = setup_connected(2).await;
        for _ in 0..2 {
            let reply = fixture.send("/cue/1/start", vec![]).await.unwrap();
            assert_eq!(reply.envelope.status, Status::Ok);
        }
        let running = fixture.send("/cue/1/isRunning", vec![]).await.unwrap();
        assert_eq!(running.envelope.data, Some(json!(1)));

        let stop = fixture.send("/cue/2/stop", vec![]).await.unwrap();
        assert_eq!(stop.envelope.status, Status::Ok);
    }

    #[tokio::test]
    async fn broken_cue_falls_through_to_properties() {
        let mut fixture = setup_connected(1).await;
        fixture
            .manager
            .set_cue_state(&fixture.ids[0], CueState::ERROR)
            .await
            .unwrap();
        let start = fixture.send("/cue/1/start", vec![]).await.unwrap();
        assert_eq!(start.envelope.status, Status::NotOk);
        let broken = fixture.send("/cue/1/isBroken", vec![]).await.unwrap();
        assert_eq!(broken.envelope.data, Some(json!(1)));
    }

    #[tokio::test]
    async fn go_and_playback_position() {
        let mut fixture = setup_connected(3).await;
        let go = fixture.send("/go", vec![]).await.unwrap();
        assert_eq!(go.envelope.status, Status::NotOk);

        fixture.send("/select/2", vec![]).await.unwrap();
        let position = fixture.send("/cue/L/playbackPosition", vec![]).await.unwrap();
        assert_eq!(position.envelope.data, Some(json!("2")));

        fixture.send("/go", vec![]).await.unwrap();
        let selected = fixture.send("/selectedCues", vec![]).await.unwrap();
        assert_eq!(
            selected.envelope.data.unwrap()[0]["uniqueID"],
            json!(fixture.ids[2].to_string())
        );
        let running = fixture.send("/runningCues", vec![]).await.unwrap();
        assert_eq!(running.envelope.data.unwrap().as_array().unwrap().len(), 1);

        let id = fixture.ids[0].to_string();
        fixture
            .send("/cue/L/playbackPositionId", vec![Argument::Str(id)])
            .await
            .unwrap();
        assert_eq!(fixture.manager.standby().await, Some(fixture.ids[0]));
    }

    #[tokio::test]
    async fn workspace_stop_fans_out() {
        let mut fixture = setup_connected(3).await;
        fixture.send("/cue/1/start", vec![]).await.unwrap();
        fixture.send("/cue/3/pause", vec![]).await.unwrap();
        fixture.send("/stop", vec![]).await.unwrap();
        for id in &fixture.ids {
            let cue = fixture.manager.get_cue_by_id(id).await.unwrap();
            assert!(cue.state.is_idle());
        }
    }

    #[tokio::test]
    async fn container_listing_and_bulk_values() {
        let mut fixture = setup_connected(2).await;
        let lists = fixture.send("/cueLists", vec![]).await.unwrap();
        let data = lists.envelope.data.unwrap();
        assert_eq!(data[0]["type"], json!("cuelist"));
        assert_eq!(data[0]["number"], json!("L"));
        assert_eq!(data[0]["cues"].as_array().unwrap().len(), 2);

        let keys = Argument::Str(r#"["name","type","levels"]"#.to_string());
        let values = fixture.send("/cue/2/valuesForKeys", vec![keys]).await.unwrap();
        assert_eq!(values.envelope.data, Some(json!({"name": "Cue 2", "type": "audio"})));

        let bad = Argument::Str("name".to_string());
        let reply = fixture.send("/cue/2/valuesForKeys", vec![bad]).await.unwrap();
        assert_eq!(reply.envelope.status, Status::NotOk);
    }

    #[tokio::test]
    async fn unknown_verbs_and_missing_session() {
        let mut fixture = setup_connected(1).await;
        let reply = fixture.send("/levels/1", vec![Argument::Int(0)]).await.unwrap();
        assert_eq!(reply.envelope.status, Status::NotOk);

        fixture.session.close(&fixture.registry).await;
        fixture.send("/connect", vec![]).await.unwrap();
        fixture.send("/alwaysReply", vec![Argument::Int(1)]).await.unwrap();
        let go = fixture.send("/go", vec![]).await.unwrap();
        assert_eq!(go.envelope.status, Status::NotOk);
        let version = fixture.send("/version", vec![]).await.unwrap();
        assert_eq!(version.envelope.status, Status::Ok);
    }

    #[tokio::test]
    async fn mutations_push_to_subscribers_only() {
        let mut fixture = setup_connected(2).await;
        let broadcaster = Broadcaster::new(
            fixture.manager.clone(),
            fixture.session.clone(),
            fixture.registry.clone(),
            fixture.manager.subscribe(),
        );
        tokio::spawn(broadcaster.run());

        let (listener_tx, mut listener_rx) = mpsc::unbounded_channel();
        let listener = ClientId("192.168.1.21:50200".parse().unwrap());
        fixture.registry.connect(listener, listener_tx).await;
        fixture.registry.set_updates(&listener, true).await.unwrap();

        fixture
            .send("/cue/1/notes", vec![Argument::Str("Warm".to_string())])
            .await
            .unwrap();

        let push = tokio::time::timeout(Duration::from_secs(1), listener_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            push.path,
            format!("/update/workspace/{}/cue_id/{}", fixture.session_id, fixture.ids[0])
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(listener_rx.try_recv().is_err());
        assert!(fixture.reply_rx.try_recv().is_err());
    }
}
