//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 配置 → 注册表 → 分发器的端到端测试
//! - 并发交付语义 (恰好一次、提交顺序)

#[cfg(test)]
mod contract_tests {
    use contracts::{SourceRegistry, StaticSourceRegistry};

    #[test]
    fn test_blueprint_builds_registry() {
        let blueprint = config_loader::ConfigLoader::load_from_str(
            r#"
[filter]
expression = "evt.num > 0"

[[sources]]
id = 1
name = "k8saudit"
event_source = "k8s_audit"

[[sources]]
id = 2
name = "cloudtrail"
"#,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let registry = StaticSourceRegistry::from_configs(&blueprint.sources);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup(1).unwrap().event_source, "k8s_audit");
        // event_source defaults to the plugin name
        assert_eq!(registry.lookup(2).unwrap().event_source, "cloudtrail");
        assert!(registry.lookup(3).is_none());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{Event, PipelineBlueprint, StaticSourceRegistry};
    use dispatcher::{
        create_dispatcher, DispatchOutcome, DispatcherConfig, DispatcherError, EventDispatcher,
        WorkerState,
    };
    use filter_lang::FilterLangCompiler;
    use rand::Rng;

    const PIPELINE: &str = r#"
[filter]
expression = "evt.source = k8saudit and json.verb in (create, delete)"

[dispatcher]
async_workers = 3
thread_name_prefix = "e2e-flt"
flush_timeout_ms = 5000

[[sources]]
id = 1
name = "k8saudit"
event_source = "k8s_audit"

[[sources]]
id = 2
name = "cloudtrail"
"#;

    fn blueprint() -> PipelineBlueprint {
        ConfigLoader::load_from_str(PIPELINE, ConfigFormat::Toml).unwrap()
    }

    fn dispatcher_for(blueprint: &PipelineBlueprint) -> EventDispatcher {
        create_dispatcher(
            DispatcherConfig::from(&blueprint.dispatcher),
            Arc::new(StaticSourceRegistry::from_configs(&blueprint.sources)),
            Arc::new(FilterLangCompiler),
            &blueprint.filter.expression,
        )
        .unwrap()
    }

    fn audit_event(num: u64, source_id: u32, verb: &str) -> Event {
        Event::new(num, source_id, format!(r#"{{"verb":"{verb}","user":"u{num}"}}"#))
    }

    /// Drive `events` through the dispatcher and collect everything it returns
    fn run_all(dispatcher: &mut EventDispatcher, events: Vec<Event>) -> (Vec<u64>, Vec<u64>) {
        let mut direct = Vec::new();
        let mut backlog = Vec::new();

        for event in events {
            if let DispatchOutcome::Accepted(event) = dispatcher.process_event(event).unwrap() {
                direct.push(event.num);
            }
            while let Some(event) = dispatcher.get_event_from_backlog() {
                backlog.push(event.num);
            }
        }
        let rest = dispatcher.flush(Duration::from_secs(10)).unwrap();
        backlog.extend(rest.iter().map(|e| e.num));
        (direct, backlog)
    }

    /// 验证完整数据流：配置 → 注册表 → 编译 → 分发 → 交付
    #[test]
    fn test_e2e_k8s_audit_pipeline() {
        let bp = blueprint();
        let mut dispatcher = dispatcher_for(&bp);

        let verbs = ["create", "get", "delete", "list", "create"];
        let mut events = Vec::new();
        for num in 0..200u64 {
            let source_id = if num % 4 == 3 { 2 } else { 1 };
            events.push(audit_event(num, source_id, verbs[num as usize % verbs.len()]));
        }
        let expected: HashSet<u64> = events
            .iter()
            .filter(|e| {
                e.source_id == 1 && {
                    let verb = verbs[e.num as usize % verbs.len()];
                    verb == "create" || verb == "delete"
                }
            })
            .map(|e| e.num)
            .collect();

        let (direct, backlog) = run_all(&mut dispatcher, events);

        // exactly once, nothing rejected leaks through
        let mut seen = HashSet::new();
        for num in direct.iter().chain(&backlog) {
            assert!(seen.insert(*num), "event {num} delivered twice");
        }
        assert_eq!(seen, expected);
        assert!(backlog.windows(2).all(|w| w[0] < w[1]));

        let metrics = dispatcher.metrics();
        assert_eq!(metrics.received, 200);
        assert_eq!(metrics.accepted as usize, expected.len());
        assert_eq!(metrics.accepted + metrics.rejected, 200);
        assert_eq!(metrics.async_dispatched + metrics.sync_fallbacks, 200);
        assert!(dispatcher.in_flight_sources().is_empty());
        assert_eq!(dispatcher.pending(), 0);

        dispatcher.shutdown().unwrap();
    }

    #[test]
    fn test_e2e_event_source_field() {
        let mut bp = blueprint();
        bp.filter.expression = "evt.event_source = k8s_audit".into();
        bp.dispatcher.async_workers = 1;
        let mut dispatcher = dispatcher_for(&bp);

        let (direct, backlog) = run_all(
            &mut dispatcher,
            vec![
                audit_event(1, 1, "get"),
                audit_event(2, 2, "get"),
                audit_event(3, 7, "get"),
            ],
        );
        let mut accepted: Vec<u64> = direct.into_iter().chain(backlog).collect();
        accepted.sort_unstable();
        assert_eq!(accepted, vec![1]);
        assert_eq!(dispatcher.metrics().unknown_sources, 1);
    }

    #[test]
    fn test_e2e_malformed_payloads_are_rejected() {
        let bp = blueprint();
        let mut dispatcher = dispatcher_for(&bp);

        let mut events = Vec::new();
        for num in 0..30u64 {
            if num % 3 == 0 {
                events.push(Event::new(num, 1, "<<not json>>"));
            } else {
                events.push(audit_event(num, 1, "create"));
            }
        }

        let (direct, backlog) = run_all(&mut dispatcher, events);
        assert_eq!(direct.len() + backlog.len(), 20);
        assert!(direct.iter().chain(&backlog).all(|n| n % 3 != 0));

        let metrics = dispatcher.metrics();
        assert_eq!(metrics.eval_failures, 10);
        assert!(dispatcher
            .worker_states()
            .iter()
            .all(|s| *s == WorkerState::Ready));
    }

    #[test]
    fn test_e2e_randomized_sources() {
        let bp = blueprint();
        let mut dispatcher = dispatcher_for(&bp);
        let mut rng = rand::rng();

        let mut expected = HashSet::new();
        let mut events = Vec::new();
        for num in 0..500u64 {
            let source_id = rng.random_range(1..=4u32);
            let verb = if rng.random_bool(0.5) { "create" } else { "patch" };
            if source_id == 1 && verb == "create" {
                expected.insert(num);
            }
            events.push(audit_event(num, source_id, verb));
        }

        let (direct, backlog) = run_all(&mut dispatcher, events);
        let delivered: HashSet<u64> = direct.iter().chain(&backlog).copied().collect();
        assert_eq!(delivered.len(), direct.len() + backlog.len());
        assert_eq!(delivered, expected);
        assert!(backlog.windows(2).all(|w| w[0] < w[1]));
        // unknown ids 3 and 4 are logged and counted on each first sighting
        assert!(dispatcher.metrics().unknown_sources >= 1);
    }

    #[test]
    fn test_e2e_invalid_filter_refuses_events() {
        let bp = blueprint();
        let err = create_dispatcher(
            DispatcherConfig::from(&bp.dispatcher),
            Arc::new(StaticSourceRegistry::from_configs(&bp.sources)),
            Arc::new(FilterLangCompiler),
            "invalid!!syntax",
        )
        .unwrap_err();
        assert!(matches!(err, DispatcherError::Compile(_)));
    }

    #[tokio::test]
    async fn test_dispatcher_runs_on_blocking_thread() {
        let bp = blueprint();
        let mut dispatcher = dispatcher_for(&bp);

        let handle = tokio::task::spawn_blocking(move || {
            let events = (0..50).map(|n| audit_event(n, 1, "delete")).collect();
            let (direct, backlog) = run_all(&mut dispatcher, events);
            dispatcher.shutdown().unwrap();
            direct.len() + backlog.len()
        });

        assert_eq!(handle.await.unwrap(), 50);
    }

    #[test]
    fn test_drop_with_busy_pool_joins_workers() {
        let mut bp = blueprint();
        bp.dispatcher.async_workers = 8;
        let mut dispatcher = dispatcher_for(&bp);

        for num in 0..8 {
            dispatcher.process_event(audit_event(num, 1, "create")).unwrap();
        }

        let started = Instant::now();
        drop(dispatcher);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
