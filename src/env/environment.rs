//! The environment session state machine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::actions::ActionBuffer;
use crate::communicator::{Communicator, TcpCommunicator};
use crate::config::EnvConfig;
use crate::error::{Result, SimLinkError};
use crate::protocol::{
    ensure_compatible, warn_base_capabilities, Command, RlCapabilities, RlInitializationInput,
    RlInput, UnityInput, UnityOutput, API_VERSION,
};
use crate::side_channel::{
    lock_channel, EngineConfigurationChannel, SharedSideChannel, SideChannelManager,
};
use crate::spec::{
    steps_from_proto, ActionTensor, ActionVector, AgentId, BehaviorName, BehaviorSpec,
    DecisionSteps, TerminalSteps,
};

type BehaviorState = (DecisionSteps, TerminalSteps);

/// What the simulation reported about itself during the handshake
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteInfo {
    /// Simulation name
    pub name: String,
    /// Remote communication API version
    pub communication_version: String,
    /// Remote package version
    pub package_version: String,
    /// Where the simulation writes its log
    pub log_path: String,
}

/// A live session with one remote simulation.
///
/// ```text
/// connect ──► Loaded(first) ──step/reset──► Loaded ──close──► Closed
///                                 ▲            │
///                                 └─step/reset─┘
/// ```
///
/// Every operation blocks for one round trip. A response is applied
/// atomically: if it is missing or malformed, specs, state and pending
/// actions are left exactly as they were.
pub struct Environment {
    communicator: Box<dyn Communicator>,
    side_channel_manager: SideChannelManager,
    remote: RemoteInfo,
    is_first_message: bool,
    loaded: bool,
    env_specs: HashMap<BehaviorName, BehaviorSpec>,
    env_state: HashMap<BehaviorName, BehaviorState>,
    env_actions: ActionBuffer,
}

impl Environment {
    /// Perform the handshake over `communicator`.
    ///
    /// The communicator is closed again if the handshake fails after it was
    /// sent.
    pub fn connect(
        communicator: impl Communicator + 'static,
        side_channels: Vec<SharedSideChannel>,
        seed: i32,
    ) -> Result<Self> {
        let side_channel_manager = SideChannelManager::new(side_channels)?;
        let mut communicator: Box<dyn Communicator> = Box::new(communicator);

        let handshake = Self::handshake(communicator.as_mut(), seed).and_then(|(remote, output)| {
            Ok((remote, Self::updated_specs(&HashMap::new(), &output)?))
        });
        match handshake {
            Ok((remote, env_specs)) => Ok(Self {
                communicator,
                side_channel_manager,
                remote,
                is_first_message: true,
                loaded: true,
                env_specs,
                env_state: HashMap::new(),
                env_actions: ActionBuffer::new(),
            }),
            Err(e) => {
                communicator.close();
                Err(e)
            },
        }
    }

    /// Listen on the configured port and wait for the simulation to connect.
    ///
    /// When `config.engine` is set and no engine configuration channel was
    /// supplied, one is added with those settings queued for the first reset.
    pub fn open(config: &EnvConfig, mut side_channels: Vec<SharedSideChannel>) -> Result<Self> {
        if let Some(engine) = &config.engine {
            let engine_id = EngineConfigurationChannel::id();
            let mut has_engine_channel = false;
            for channel in &side_channels {
                has_engine_channel |= lock_channel(channel)?.channel_id() == engine_id;
            }
            if has_engine_channel {
                tracing::debug!("Engine settings ignored: an engine configuration channel was supplied");
            } else {
                let mut channel = EngineConfigurationChannel::new();
                channel.set_configuration(engine);
                side_channels.push(Arc::new(Mutex::new(channel)));
            }
        }

        let communicator = TcpCommunicator::bind(config.port()?, config.timeout())?;
        Self::connect(communicator, side_channels, config.seed)
    }

    fn handshake(
        communicator: &mut dyn Communicator,
        seed: i32,
    ) -> Result<(RemoteInfo, UnityOutput)> {
        let input = UnityInput::initialization(RlInitializationInput {
            seed,
            communication_version: API_VERSION.to_string(),
            package_version: crate::VERSION.to_string(),
            capabilities: RlCapabilities::default(),
        });

        let output = communicator.initialize(input)?.ok_or_else(|| {
            SimLinkError::CommunicatorStopped(
                "The simulation closed the connection during the handshake".to_string(),
            )
        })?;
        let init = output.rl_initialization_output.as_ref().ok_or_else(|| {
            SimLinkError::MalformedResponse(
                "Handshake response carries no initialization output".to_string(),
            )
        })?;

        ensure_compatible(
            &init.communication_version,
            API_VERSION,
            &init.package_version,
        )?;
        warn_base_capabilities(
            init.capabilities.as_ref(),
            &init.package_version,
            crate::VERSION,
        );

        let remote = RemoteInfo {
            name: init.name.clone(),
            communication_version: init.communication_version.clone(),
            package_version: init.package_version.clone(),
            log_path: init.log_path.clone(),
        };
        Ok((remote, output))
    }

    /// Advance the simulation one step.
    ///
    /// The first call after connecting performs a reset instead. Behaviors
    /// without pending actions are sent zeros for each decision agent.
    pub fn step(&mut self) -> Result<()> {
        if self.is_first_message {
            return self.reset();
        }
        self.ensure_loaded()?;

        let agent_actions = self
            .env_actions
            .to_agent_actions(&self.env_specs, &self.env_state);
        let side_channel = self.side_channel_manager.generate_side_channel_messages()?;
        let input = UnityInput::rl(RlInput {
            agent_actions,
            command: Command::Step,
            side_channel,
        });

        tracing::debug!("Sending step for {} behaviors", self.env_specs.len());
        let output = self.exchange(input)?;
        self.apply_output(output)
    }

    /// Reset every episode in the simulation
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_loaded()?;

        let side_channel = self.side_channel_manager.generate_side_channel_messages()?;
        let input = UnityInput::rl(RlInput {
            command: Command::Reset,
            side_channel,
            ..Default::default()
        });

        tracing::debug!("Sending reset");
        let output = self.exchange(input)?;
        self.apply_output(output)
    }

    /// End the session and release the communicator
    pub fn close(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        self.loaded = false;
        self.communicator.close();
        tracing::info!("Environment shut down");
        Ok(())
    }

    /// Queue actions for every decision agent of `behavior`.
    ///
    /// `actions` must have one row per decision agent in batch order. Does
    /// nothing when the behavior has no stored state yet.
    pub fn set_actions(&mut self, behavior: &str, actions: ActionTensor) -> Result<()> {
        let spec = spec_for(&self.env_specs, behavior)?;
        let Some((decision, _)) = self.env_state.get(behavior) else {
            return Ok(());
        };
        self.env_actions.set(behavior, spec, decision, actions)
    }

    /// Queue the action of one decision agent; others default to zeros
    pub fn set_action_for_agent(
        &mut self,
        behavior: &str,
        agent_id: AgentId,
        action: ActionVector,
    ) -> Result<()> {
        let spec = spec_for(&self.env_specs, behavior)?;
        let Some((decision, _)) = self.env_state.get(behavior) else {
            return Ok(());
        };
        self.env_actions
            .set_for_agent(behavior, spec, decision, agent_id, &action)
    }

    /// Latest decision and terminal steps of `behavior`.
    ///
    /// `None` until the behavior has appeared in a step or reset response.
    pub fn get_steps(&self, behavior: &str) -> Result<Option<(&DecisionSteps, &TerminalSteps)>> {
        spec_for(&self.env_specs, behavior)?;
        Ok(self
            .env_state
            .get(behavior)
            .map(|(decision, terminal)| (decision, terminal)))
    }

    /// Every known behavior and its spec
    pub fn behavior_specs(&self) -> &HashMap<BehaviorName, BehaviorSpec> {
        &self.env_specs
    }

    /// Known behavior names, sorted
    pub fn behavior_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.env_specs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Actions queued for the next step of `behavior`
    pub fn pending_actions(&self, behavior: &str) -> Option<&ActionTensor> {
        self.env_actions.get(behavior)
    }

    /// Handshake information from the simulation
    pub fn remote(&self) -> &RemoteInfo {
        &self.remote
    }

    /// Whether the session is still open
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Whether the next `step` will be sent as a reset
    pub fn is_first_message(&self) -> bool {
        self.is_first_message
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.loaded {
            Ok(())
        } else {
            Err(SimLinkError::EnvironmentNotLoaded)
        }
    }

    fn exchange(&mut self, input: UnityInput) -> Result<UnityOutput> {
        self.communicator.exchange(input)?.ok_or_else(|| {
            SimLinkError::CommunicatorStopped(
                "The simulation has stopped or closed the connection".to_string(),
            )
        })
    }

    /// Validate the whole response, then commit specs, state and side channel data
    fn apply_output(&mut self, output: UnityOutput) -> Result<()> {
        let specs = Self::updated_specs(&self.env_specs, &output)?;
        let state = Self::build_state(&specs, &output)?;
        let messages = SideChannelManager::parse(&output.rl_output.side_channel)?;

        self.env_specs = specs;
        self.env_state = state;
        self.env_actions.clear();
        self.is_first_message = false;

        self.side_channel_manager.dispatch(messages)
    }

    fn updated_specs(
        current: &HashMap<BehaviorName, BehaviorSpec>,
        output: &UnityOutput,
    ) -> Result<HashMap<BehaviorName, BehaviorSpec>> {
        let mut specs = current.clone();
        let Some(init) = &output.rl_initialization_output else {
            return Ok(specs);
        };

        for brain in &init.brain_parameters {
            let Some(first) = output
                .rl_output
                .agent_infos
                .get(&brain.brain_name)
                .and_then(|infos| infos.first())
            else {
                continue;
            };
            let spec = BehaviorSpec::from_proto(brain, first)?;
            if !specs.contains_key(&brain.brain_name) {
                tracing::info!("Connected new brain: {}", brain.brain_name);
            }
            specs.insert(brain.brain_name.clone(), spec);
        }
        Ok(specs)
    }

    fn build_state(
        specs: &HashMap<BehaviorName, BehaviorSpec>,
        output: &UnityOutput,
    ) -> Result<HashMap<BehaviorName, BehaviorState>> {
        specs
            .iter()
            .map(|(name, spec)| {
                let steps = match output.rl_output.agent_infos.get(name) {
                    Some(infos) if !infos.is_empty() => steps_from_proto(infos, spec)?,
                    _ => (DecisionSteps::empty(spec), TerminalSteps::empty(spec)),
                };
                Ok((name.clone(), steps))
            })
            .collect()
    }
}

fn spec_for<'a>(
    specs: &'a HashMap<BehaviorName, BehaviorSpec>,
    behavior: &str,
) -> Result<&'a BehaviorSpec> {
    specs
        .get(behavior)
        .ok_or_else(|| SimLinkError::UnknownBehaviorGroup(behavior.to_string()))
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("remote", &self.remote)
            .field("loaded", &self.loaded)
            .field("is_first_message", &self.is_first_message)
            .field("behaviors", &self.behavior_names())
            .field("side_channels", &self.side_channel_manager)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use ndarray::array;

    use super::*;
    use crate::protocol::{
        AgentInfoProto, BrainParametersProto, ObservationProto, RlInitializationOutput,
        RlOutput, SpaceType,
    };

    /// Replays canned responses and records every input
    #[derive(Default)]
    struct Scripted {
        responses: VecDeque<Option<UnityOutput>>,
        sent: Arc<Mutex<Vec<UnityInput>>>,
        closed: Arc<Mutex<usize>>,
    }

    impl Communicator for Scripted {
        fn initialize(&mut self, input: UnityInput) -> Result<Option<UnityOutput>> {
            self.exchange(input)
        }

        fn exchange(&mut self, input: UnityInput) -> Result<Option<UnityOutput>> {
            self.sent.lock().unwrap().push(input);
            Ok(self.responses.pop_front().flatten())
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() += 1;
        }
    }

    fn handshake(version: &str) -> UnityOutput {
        UnityOutput {
            rl_initialization_output: Some(RlInitializationOutput {
                name: "Arena".to_string(),
                communication_version: version.to_string(),
                package_version: "2.0.0".to_string(),
                capabilities: Some(RlCapabilities::default()),
                brain_parameters: vec![brain()],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn brain() -> BrainParametersProto {
        BrainParametersProto {
            brain_name: "Walker".to_string(),
            vector_action_size: vec![2],
            vector_action_space_type: SpaceType::Continuous,
            ..Default::default()
        }
    }

    fn agents(ids: &[i32]) -> UnityOutput {
        let infos = ids
            .iter()
            .map(|&id| AgentInfoProto {
                id,
                reward: 1.0,
                observations: vec![ObservationProto::vector(vec![0.0, 1.0, 2.0])],
                ..Default::default()
            })
            .collect();
        UnityOutput {
            rl_output: RlOutput {
                agent_infos: [("Walker".to_string(), infos)].into_iter().collect(),
                ..Default::default()
            },
            rl_initialization_output: Some(RlInitializationOutput {
                brain_parameters: vec![brain()],
                ..Default::default()
            }),
        }
    }

    fn connect(responses: Vec<Option<UnityOutput>>) -> (Environment, Arc<Mutex<Vec<UnityInput>>>) {
        let comm = Scripted {
            responses: responses.into(),
            ..Default::default()
        };
        let sent = comm.sent.clone();
        (Environment::connect(comm, Vec::new(), 0).unwrap(), sent)
    }

    #[test]
    fn test_handshake_sends_local_versions() {
        let (env, sent) = connect(vec![Some(handshake("1.0.0"))]);
        let init = sent.lock().unwrap()[0].rl_initialization_input.clone().unwrap();
        assert_eq!(init.communication_version, API_VERSION);
        assert!(init.capabilities.base_rl_capabilities);
        assert_eq!(env.remote().name, "Arena");
        assert!(env.is_first_message());
        assert!(env.behavior_specs().is_empty());
    }

    #[test]
    fn test_major_mismatch_closes_communicator() {
        let comm = Scripted {
            responses: vec![Some(handshake("2.0.0"))].into(),
            ..Default::default()
        };
        let closed = comm.closed.clone();
        let err = Environment::connect(comm, Vec::new(), 0).unwrap_err();
        assert!(matches!(err, SimLinkError::VersionIncompatible { .. }));
        assert_eq!(*closed.lock().unwrap(), 1);
    }

    #[test]
    fn test_silent_handshake_is_stopped() {
        let comm = Scripted::default();
        let err = Environment::connect(comm, Vec::new(), 0).unwrap_err();
        assert!(matches!(err, SimLinkError::CommunicatorStopped(_)));
    }

    #[test]
    fn test_first_step_is_reset() {
        let (mut env, sent) = connect(vec![Some(handshake("1.0.0")), Some(agents(&[1, 2]))]);
        env.step().unwrap();

        assert_eq!(sent.lock().unwrap()[1].command(), Some(Command::Reset));
        assert!(!env.is_first_message());
        let (decision, terminal) = env.get_steps("Walker").unwrap().unwrap();
        assert_eq!(decision.agent_id, vec![1, 2]);
        assert!(terminal.is_empty());
    }

    #[test]
    fn test_unknown_behavior() {
        let (mut env, _) = connect(vec![Some(handshake("1.0.0"))]);
        assert!(matches!(
            env.get_steps("Runner"),
            Err(SimLinkError::UnknownBehaviorGroup(_))
        ));
        assert!(matches!(
            env.set_actions("Runner", ActionTensor::Continuous(array![[0.0, 0.0]])),
            Err(SimLinkError::UnknownBehaviorGroup(_))
        ));
    }

    #[test]
    fn test_step_after_close() {
        let (mut env, _) = connect(vec![Some(handshake("1.0.0")), Some(agents(&[1]))]);
        env.reset().unwrap();
        env.close().unwrap();
        assert!(matches!(env.step(), Err(SimLinkError::EnvironmentNotLoaded)));
        assert!(matches!(env.close(), Err(SimLinkError::EnvironmentNotLoaded)));
    }

    #[test]
    fn test_pending_actions_cleared_after_step() {
        let (mut env, sent) = connect(vec![
            Some(handshake("1.0.0")),
            Some(agents(&[1])),
            Some(agents(&[1])),
        ]);
        env.reset().unwrap();
        env.set_actions("Walker", ActionTensor::Continuous(array![[0.25, 0.75]]))
            .unwrap();
        env.step().unwrap();

        let actions = sent.lock().unwrap()[2].rl_input.clone().unwrap().agent_actions;
        assert_eq!(actions["Walker"][0].vector_actions, vec![0.25, 0.75]);
        assert!(env.pending_actions("Walker").is_none());
    }
}
