mod common;

use nalgebra::Vector3;
use spinefit_agent::{AgentId, Lifecycle, RaceCoordinator, RaceOutcome, TickClock};
use spinefit_sensor::SensorReading;

use self::common::{Oracle, Still, agent, config, preview};

const MAX_FRAMES: u64 = 5_000;

#[test]
fn test_first_success_wins_and_cancels_the_rest() {
    let config = config();
    let rig = config.rig().unwrap();
    let generator = config.generator(&rig, 11).unwrap();
    let expected = preview(&generator);

    // identical oracles reach the target on the same tick; agent 0 ticks first
    let agents = (0..3)
        .map(|i| {
            let oracle = Oracle::new(&rig, &config.agent, &expected, 0);
            agent(&config, &rig, i, Box::new(oracle))
        })
        .collect();
    let mut coordinator = RaceCoordinator::new(generator, agents, vec![Vector3::zeros(); 13]);

    let outcome = coordinator
        .run_to_completion(&mut TickClock::new(), MAX_FRAMES)
        .unwrap();
    let RaceOutcome::Won(summary) = outcome else {
        panic!("expected a winner, got {outcome:?}");
    };
    assert_eq!(summary.winner, AgentId(0));
    assert_eq!(summary.posture, expected.posture);
    assert_eq!(summary.target, expected.target);
    assert!(summary.total_error < config.agent.success_threshold);
    assert!(!coordinator.is_racing());

    assert_eq!(coordinator.agents()[0].lifecycle(), Lifecycle::Succeeded);
    for loser in &coordinator.agents()[1..] {
        assert_eq!(loser.lifecycle(), Lifecycle::Idle);
    }

    assert_eq!(summary.slots_written, 13);
    assert_eq!(coordinator.sink(), &summary.rotations);
}

#[test]
fn test_slower_agent_loses() {
    let config = config();
    let rig = config.rig().unwrap();
    let generator = config.generator(&rig, 5).unwrap();
    let expected = preview(&generator);

    let slow = Oracle::new(&rig, &config.agent, &expected, 4);
    let fast = Oracle::new(&rig, &config.agent, &expected, 0);
    let agents = vec![
        agent(&config, &rig, 0, Box::new(slow)),
        agent(&config, &rig, 1, Box::new(fast)),
    ];
    let mut coordinator = RaceCoordinator::new(generator, agents, vec![Vector3::zeros(); 4]);

    let Some(RaceOutcome::Won(summary)) =
        coordinator.run_to_completion(&mut TickClock::new(), MAX_FRAMES)
    else {
        panic!("expected a winner");
    };
    assert_eq!(summary.winner, AgentId(1));
    assert_eq!(summary.slots_written, 4);
    assert_eq!(coordinator.agent(AgentId(0)).unwrap().lifecycle(), Lifecycle::Idle);
    // the loser never got further than its idle steps plus one
    assert!(coordinator.agent(AgentId(0)).unwrap().state().step() <= summary.steps + 4);
}

#[test]
fn test_run_race_is_idempotent_while_running() {
    let config = config();
    let mut coordinator = config.coordinator(3).unwrap();
    assert!(coordinator.run_race().is_started());
    assert!(coordinator.run_race().is_already_running());
    assert_eq!(coordinator.race_count(), 1);
    coordinator.abort_race();
    assert!(!coordinator.is_racing());
    assert!(coordinator.run_race().is_started());
    assert_eq!(coordinator.race_count(), 2);
}

#[test]
fn test_race_without_success_is_exhausted() {
    let mut config = config();
    config.agent.max_steps = 3;
    let rig = config.rig().unwrap();
    let generator = config.generator(&rig, 2).unwrap();
    let agents = (0..2).map(|i| agent(&config, &rig, i, Box::new(Still))).collect();
    let mut coordinator = RaceCoordinator::new(generator, agents, Vec::new());

    let outcome = coordinator
        .run_to_completion(&mut TickClock::new(), MAX_FRAMES)
        .unwrap();
    assert!(outcome.is_exhausted(), "{outcome:?}");
    assert!(!coordinator.is_racing());
    for agent in coordinator.agents() {
        assert_eq!(agent.lifecycle(), Lifecycle::TimedOut);
    }
}

#[test]
fn test_soft_body_target_is_not_matched_at_rest() {
    let mut config = config();
    config.body.settle_rate = 0.05;
    config.agent.max_steps = 3;
    let rig = config.rig().unwrap();
    let generator = config.generator(&rig, 1).unwrap();
    let agents = vec![agent(&config, &rig, 0, Box::new(Still))];
    let mut coordinator = RaceCoordinator::new(generator, agents, Vec::new());

    let outcome = coordinator
        .run_to_completion(&mut TickClock::new(), MAX_FRAMES)
        .unwrap();
    let RaceOutcome::Exhausted { target, .. } = &outcome else {
        panic!("expected no winner, got {outcome:?}");
    };
    assert!(target.error(&SensorReading::ZERO) > config.agent.success_threshold);
    assert_eq!(coordinator.agents()[0].lifecycle(), Lifecycle::TimedOut);
}

#[test]
fn test_faulted_agent_does_not_stop_the_race() {
    let config = config();
    let rig = config.rig().unwrap();
    let generator = config.generator(&rig, 8).unwrap();
    let expected = preview(&generator);

    let broken_body = rig.body().clone();
    let broken_mesh = spinefit_body::SurfaceMesh::new(Vec::new());
    let broken_sensor =
        spinefit_sensor::SensorModel::from_mesh(&broken_mesh, config.sensor.clone()).unwrap();
    let broken = spinefit_agent::SolverAgent::new(
        AgentId(0),
        broken_body,
        broken_sensor,
        config.agent.clone(),
        &config.clock,
        Box::new(Still),
    );
    assert_eq!(broken.lifecycle(), Lifecycle::Faulted);

    let oracle = Oracle::new(&rig, &config.agent, &expected, 0);
    let agents = vec![broken, agent(&config, &rig, 1, Box::new(oracle))];
    let mut coordinator = RaceCoordinator::new(generator, agents, Vec::new());
    let Some(RaceOutcome::Won(summary)) =
        coordinator.run_to_completion(&mut TickClock::new(), MAX_FRAMES)
    else {
        panic!("expected a winner");
    };
    assert_eq!(summary.winner, AgentId(1));
    assert_eq!(summary.slots_written, 0);
    assert_eq!(coordinator.agents()[0].lifecycle(), Lifecycle::Faulted);
}

#[test]
fn test_consecutive_races() {
    let config = config();
    let rig = config.rig().unwrap();
    let generator = config.generator(&rig, 21).unwrap();
    let mut preview_gen = generator.clone();
    let mut clock = TickClock::new();
    let first = preview_gen.generate(&mut clock).unwrap();

    let agents = vec![agent(
        &config,
        &rig,
        0,
        Box::new(Oracle::new(&rig, &config.agent, &first, 0)),
    )];
    let mut coordinator = RaceCoordinator::new(generator, agents, Vec::new());
    let mut clock = TickClock::new();
    assert!(coordinator.run_to_completion(&mut clock, MAX_FRAMES).unwrap().is_won());
    // a second race starts from rest and reuses the same agents
    let second = coordinator.run_to_completion(&mut clock, MAX_FRAMES).unwrap();
    assert!(!matches!(second, RaceOutcome::Failed(_)));
    assert_eq!(coordinator.race_count(), 2);
}
