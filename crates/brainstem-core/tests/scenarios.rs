//! End-to-end decision ticks through the public API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use brainstem_core::app::{BrainBuilder, BrainConfig, BrainController};
use brainstem_core::domain::names;
use brainstem_core::domain::{
    ActionSpace, AgentBatch, AgentId, AgentRecord, BrainError, BrainState, Dim, ElementKind,
    ObservationSpec, TensorSpec, TickOutcome, VisualObservation, VisualShape,
};
use brainstem_core::impls::{DenseHead, DenseModelDef, DenseModelLoader, InMemoryRemoteChannel, LoaderStats};
use brainstem_core::pipeline::{AgentMemoryStore, TensorAllocator, TensorGenerator};
use brainstem_core::ports::{
    ExecuteError, InferenceDevice, LoadError, ModelHandle, ModelLoader, ModelRef, RecordingSpanHook,
    TensorMap,
};
use ulid::Ulid;

fn agent(n: u128) -> AgentId {
    AgentId::from_ulid(Ulid(n))
}

/// vector_obs[8] -> continuous_actions[2] = (first element, sum of all)
fn walker_def() -> DenseModelDef {
    let mut weights = vec![0.0; 16];
    weights[0] = 1.0;
    for w in &mut weights[8..] {
        *w = 1.0;
    }
    DenseModelDef::new(vec![TensorSpec::batched(names::VECTOR_OBSERVATION, 8)]).with_head(DenseHead::new(
        TensorSpec::batched(names::CONTINUOUS_ACTIONS, 2),
        names::VECTOR_OBSERVATION,
        weights,
        vec![0.0, 0.0],
    ))
}

fn walker_spec() -> ObservationSpec {
    ObservationSpec::vector(8, ActionSpace::continuous(2))
}

fn brain_with(loader: Arc<dyn ModelLoader>, spec: ObservationSpec, model: &str) -> BrainController {
    BrainBuilder::new(spec, loader)
        .config(BrainConfig::default().with_model(model))
        .build()
        .unwrap()
}

fn decided(outcome: TickOutcome) -> Vec<brainstem_core::domain::AgentAction> {
    match outcome {
        TickOutcome::Decided(actions) => actions,
        other => panic!("expected a local decision, got {other:?}"),
    }
}

/// Wraps the dense backend and counts `execute` calls.
struct CountingLoader {
    inner: DenseModelLoader,
    executions: Arc<AtomicUsize>,
}

struct CountingModel {
    inner: Box<dyn ModelHandle>,
    executions: Arc<AtomicUsize>,
}

impl ModelHandle for CountingModel {
    fn input_signature(&self) -> &[TensorSpec] {
        self.inner.input_signature()
    }

    fn output_signature(&self) -> &[TensorSpec] {
        self.inner.output_signature()
    }

    fn execute(&mut self, inputs: &TensorMap) -> Result<TensorMap, ExecuteError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(inputs)
    }

    fn release(self: Box<Self>) {
        self.inner.release();
    }
}

impl ModelLoader for CountingLoader {
    fn load(&self, reference: &ModelRef, device: InferenceDevice) -> Result<Box<dyn ModelHandle>, LoadError> {
        let inner = self.inner.load(reference, device)?;
        Ok(Box::new(CountingModel {
            inner,
            executions: self.executions.clone(),
        }))
    }
}

#[test]
fn batch_of_three_yields_three_continuous_actions() {
    let loader = Arc::new(DenseModelLoader::new().with_model("walker", walker_def()));
    let mut brain = brain_with(loader, walker_spec(), "walker");
    brain.initialize().unwrap();

    let sig = brain.input_signature().unwrap().to_vec();
    assert_eq!(sig, vec![TensorSpec::new(
        names::VECTOR_OBSERVATION,
        vec![Dim::Batch, Dim::Fixed(8)],
        ElementKind::Float
    )]);

    let batch = AgentBatch::new(
        (1..=3)
            .map(|i| AgentRecord::new(agent(i), vec![i as f32; 8]))
            .collect(),
    );
    let actions = decided(brain.decide(batch).unwrap());
    assert_eq!(actions.len(), 3);
    for (i, action) in actions.iter().enumerate() {
        let v = (i + 1) as f32;
        assert_eq!(action.agent_id, agent(i as u128 + 1));
        assert_eq!(action.continuous, vec![v, 8.0 * v]);
    }
}

#[test]
fn generated_inputs_bind_to_the_batch_size() {
    let spec = walker_spec();
    let generator = TensorGenerator::new(spec, 0);
    let batch = AgentBatch::new(
        (1..=3)
            .map(|i| AgentRecord::new(agent(i), vec![0.5; 8]))
            .collect(),
    );
    let mut allocator = TensorAllocator::new();
    let inputs = generator
        .generate(
            &[TensorSpec::batched(names::VECTOR_OBSERVATION, 8)],
            &batch,
            &AgentMemoryStore::new(),
            &mut allocator,
        )
        .unwrap();
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[names::VECTOR_OBSERVATION].shape, vec![3, 8]);
}

#[test]
fn undeclared_visual_input_is_rejected_and_brain_stays_unloaded() {
    let def = DenseModelDef::new(vec![
        TensorSpec::batched(names::VECTOR_OBSERVATION, 8),
        TensorSpec::new(
            names::visual_observation(0),
            vec![Dim::Batch, Dim::Fixed(4), Dim::Fixed(4), Dim::Fixed(3)],
            ElementKind::Float,
        ),
    ])
    .with_head(DenseHead::new(
        TensorSpec::batched(names::CONTINUOUS_ACTIONS, 2),
        names::VECTOR_OBSERVATION,
        vec![0.0; 16],
        vec![0.0, 0.0],
    ));
    let loader = Arc::new(DenseModelLoader::new().with_model("camera", def));
    let mut brain = brain_with(loader.clone(), walker_spec(), "camera");

    let err = brain.initialize().unwrap_err();
    let BrainError::Configuration(violations) = &err else {
        panic!("expected a configuration error, got {err:?}");
    };
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].field, "visual_obs_0");
    assert_eq!(brain.state(), BrainState::Unloaded);
    assert_eq!(loader.stats(), LoaderStats { loaded: 1, released: 1 });

    let skipped = brain
        .decide(AgentBatch::new(vec![AgentRecord::new(agent(1), vec![0.0; 8])]))
        .unwrap();
    assert!(matches!(skipped, TickOutcome::Skipped(_)));
}

#[test]
fn active_remote_channel_bypasses_local_inference() {
    let executions = Arc::new(AtomicUsize::new(0));
    let loader = Arc::new(CountingLoader {
        inner: DenseModelLoader::new().with_model("walker", walker_def()),
        executions: executions.clone(),
    });
    let remote = InMemoryRemoteChannel::connected();
    let mut brain = BrainBuilder::new(walker_spec(), loader)
        .config(BrainConfig::default().with_model("walker"))
        .remote(Box::new(remote.clone()))
        .build()
        .unwrap();
    brain.initialize().unwrap();
    assert!(remote.is_subscribed("brain"));

    let batch = AgentBatch::new(vec![
        AgentRecord::new(agent(1), vec![1.0; 8]),
        AgentRecord::new(agent(2), vec![2.0; 8]),
    ])
    .at_step(9);
    assert_eq!(brain.decide(batch.clone()).unwrap(), TickOutcome::Forwarded);
    assert_eq!(executions.load(Ordering::SeqCst), 0);
    assert_eq!(remote.forwarded(), vec![("brain".to_string(), batch.clone())]);

    remote.set_active(false);
    decided(brain.decide(batch).unwrap());
    assert_eq!(executions.load(Ordering::SeqCst), 1);
}

#[test]
fn visual_channel_mismatch_aborts_the_whole_tick() {
    let frame = VisualShape::new(2, 2, 3);
    let spec = walker_spec().with_visual(frame);
    let def = DenseModelDef::new(vec![
        TensorSpec::batched(names::VECTOR_OBSERVATION, 8),
        TensorSpec::new(
            names::visual_observation(0),
            vec![Dim::Batch, Dim::Fixed(2), Dim::Fixed(2), Dim::Fixed(3)],
            ElementKind::Float,
        ),
    ])
    .with_head(DenseHead::new(
        TensorSpec::batched(names::CONTINUOUS_ACTIONS, 2),
        names::visual_observation(0),
        vec![1.0; 24],
        vec![0.0, 0.0],
    ));
    let loader = Arc::new(DenseModelLoader::new().with_model("camera", def));
    let mut brain = brain_with(loader, spec, "camera");
    brain.initialize().unwrap();

    let good = |id| AgentRecord::new(id, vec![0.0; 8]).with_visual(VisualObservation::filled(frame, 0.5));
    decided(brain.decide(AgentBatch::new(vec![good(agent(1)), good(agent(2))])).unwrap());
    assert_eq!(brain.last_action(&agent(1)).continuous, vec![6.0, 6.0]);

    let wrong = AgentRecord::new(agent(2), vec![0.0; 8])
        .with_visual(VisualObservation::filled(VisualShape::new(2, 2, 1), 1.0));
    let mut first = good(agent(1));
    first.visual_observations[0] = VisualObservation::filled(frame, 1.0);
    let err = brain.decide(AgentBatch::new(vec![first, wrong])).unwrap_err();

    assert!(matches!(err, BrainError::Binding(_)));
    assert_eq!(brain.last_action(&agent(1)).continuous, vec![6.0, 6.0]);
    assert_eq!(brain.last_action(&agent(2)).continuous, vec![6.0, 6.0]);
}

#[test]
fn reloading_the_same_model_releases_each_handle_once() {
    let loader = Arc::new(DenseModelLoader::new().with_model("walker", walker_def()));
    let mut brain = brain_with(loader.clone(), walker_spec(), "walker");

    let first = brain.initialize().unwrap();
    let inputs = brain.input_signature().unwrap().to_vec();
    let outputs = brain.output_signature().unwrap().to_vec();

    let second = brain.reload(brain.config().clone()).unwrap();
    assert_ne!(first.model_id(), second.model_id());
    assert_eq!(brain.input_signature().unwrap(), &inputs[..]);
    assert_eq!(brain.output_signature().unwrap(), &outputs[..]);
    assert_eq!(loader.stats(), LoaderStats { loaded: 2, released: 1 });

    brain.shutdown();
    assert_eq!(brain.state(), BrainState::Unloaded);
    assert_eq!(loader.stats(), LoaderStats { loaded: 2, released: 2 });
}

#[test]
fn actions_follow_batch_order() {
    let loader = Arc::new(DenseModelLoader::new().with_model("walker", walker_def()));
    let mut brain = brain_with(loader, walker_spec(), "walker");
    brain.initialize().unwrap();

    let order = [5u128, 2, 9, 1, 7];
    let batch = AgentBatch::new(
        order
            .iter()
            .map(|&n| AgentRecord::new(agent(n), vec![n as f32; 8]))
            .collect(),
    );
    let actions = decided(brain.decide(batch).unwrap());
    let ids: Vec<AgentId> = actions.iter().map(|a| a.agent_id).collect();
    assert_eq!(ids, order.iter().map(|&n| agent(n)).collect::<Vec<_>>());
    for (action, &n) in actions.iter().zip(&order) {
        assert_eq!(action.continuous[0], n as f32);
    }
}

#[test]
fn sampled_discrete_actions_replay_after_reload() {
    let spec = ObservationSpec::vector(2, ActionSpace::discrete(vec![4]));
    let def = DenseModelDef::new(vec![TensorSpec::batched(names::VECTOR_OBSERVATION, 2)]).with_head(
        DenseHead::new(
            TensorSpec::batched(names::discrete_actions(0), 4),
            names::VECTOR_OBSERVATION,
            vec![0.0; 8],
            vec![0.0; 4],
        ),
    );
    let loader = Arc::new(DenseModelLoader::new().with_model("chooser", def));
    let mut brain = BrainBuilder::new(spec, loader)
        .config(BrainConfig::default().with_model("chooser").with_seed(99))
        .build()
        .unwrap();

    let run = |brain: &mut BrainController| -> Vec<i32> {
        brain.initialize().unwrap();
        (0..8)
            .flat_map(|step| {
                let batch = AgentBatch::new(vec![AgentRecord::new(agent(1), vec![0.0, 0.0])]).at_step(step);
                decided(brain.decide(batch).unwrap())[0].discrete.clone()
            })
            .collect()
    };
    let first = run(&mut brain);
    let second = run(&mut brain);
    assert_eq!(first, second);
    assert!(first.iter().all(|&i| (0..4).contains(&i)));
}

#[test]
fn span_hook_sees_every_stage_once_per_tick() {
    let hook = Arc::new(RecordingSpanHook::new());
    let loader = Arc::new(DenseModelLoader::new().with_model("walker", walker_def()));
    let mut brain = BrainBuilder::new(walker_spec(), loader)
        .config(BrainConfig::default().with_model("walker"))
        .span_hook(hook.clone())
        .build()
        .unwrap();
    brain.initialize().unwrap();
    for step in 0..2 {
        let batch = AgentBatch::new(vec![AgentRecord::new(agent(1), vec![0.0; 8])]).at_step(step);
        brain.decide(batch).unwrap();
    }
    assert_eq!(
        hook.names(),
        vec!["generate", "execute", "apply", "generate", "execute", "apply"]
    );
}
