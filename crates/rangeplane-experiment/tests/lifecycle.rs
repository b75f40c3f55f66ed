//! Experiment lifecycle tests.
//!
//! Everything runs in-process: an in-memory redb store wrapped to count
//! writes, the simulated cluster, and recording apps.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use rangeplane_apps::{App, AppError, AppRegistry, AppResult, AppsConfig};
use rangeplane_cluster::{ClusterBackend, SimCluster, VmState};
use rangeplane_experiment::{
    Controller, ControllerConfig, CreateRequest, ExperimentError, StartRequest, VlanRange, capture_path,
};
use rangeplane_store::{DocumentStore, RedbStore, StoreError, StoreResult};
use rangeplane_types::{
    AppHost, Document, Experiment, General, Hardware, Interface, Kind, Metadata, Network, Node, ScenarioApp,
    ScenarioSpec, TopologySpec,
};
use serde_json::json;
use tempfile::TempDir;

// ── Test doubles ────────────────────────────────────────────────────────

/// Counts every write that reaches the inner store. Updates can be made to
/// fail.
struct CountingStore {
    inner: RedbStore,
    writes: AtomicUsize,
    fail_updates: AtomicBool,
}

impl CountingStore {
    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }
}

impl DocumentStore for CountingStore {
    fn list(&self, kinds: &[Kind]) -> StoreResult<Vec<Document>> {
        self.inner.list(kinds)
    }

    fn get(&self, kind: Kind, name: &str) -> StoreResult<Document> {
        self.inner.get(kind, name)
    }

    fn create(&self, doc: &mut Document) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.create(doc)
    }

    fn update(&self, doc: &mut Document) -> StoreResult<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Write("disk full".into()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.update(doc)
    }

    fn delete(&self, kind: Kind, name: &str) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(kind, name)
    }
}

type Log = Arc<Mutex<Vec<String>>>;

/// Records each configure call; optionally fails.
struct Recorder {
    name: &'static str,
    log: Log,
    fail: bool,
}

impl App for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn configure(&self, _exp: &mut Experiment) -> AppResult<()> {
        self.log.lock().unwrap().push(self.name.to_string());
        if self.fail {
            return Err(AppError::failed(self.name, "refusing to configure"));
        }
        Ok(())
    }
}

/// Blocks inside configure until released.
struct Gate {
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl App for Gate {
    fn name(&self) -> &str {
        "gate"
    }

    fn configure(&self, _exp: &mut Experiment) -> AppResult<()> {
        self.entered.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        Ok(())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────────

struct Env {
    dir: TempDir,
    store: Arc<CountingStore>,
    sim: Arc<SimCluster>,
    log: Log,
}

impl Env {
    fn new(hosts: usize) -> Self {
        let env = Self {
            dir: TempDir::new().unwrap(),
            store: Arc::new(CountingStore {
                inner: RedbStore::open_in_memory().unwrap(),
                writes: AtomicUsize::new(0),
                fail_updates: AtomicBool::new(false),
            }),
            sim: Arc::new(SimCluster::with_hosts(hosts, 16, 32_768)),
            log: Log::default(),
        };
        env.put(Document::from_spec(Kind::Topology, Metadata::named("basic-3-node"), &basic_3_node()).unwrap());
        env
    }

    fn put(&self, mut doc: Document) {
        self.store.inner.create(&mut doc).unwrap();
    }

    fn apps_config(&self) -> AppsConfig {
        AppsConfig {
            search_path: vec![self.dir.path().join("no-external-apps")],
            ..Default::default()
        }
    }

    fn recorder(&self, name: &'static str, fail: bool) -> Recorder {
        Recorder {
            name,
            log: self.log.clone(),
            fail,
        }
    }

    fn controller_with(&self, apps: AppRegistry) -> Controller {
        Controller::new(
            self.store.clone(),
            self.sim.clone(),
            Arc::new(apps),
            ControllerConfig::with_root(self.dir.path()),
        )
    }

    /// Built-in apps only.
    fn controller(&self) -> Controller {
        self.controller_with(AppRegistry::with_defaults(self.apps_config()).unwrap())
    }

    fn ran(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn put_scenario(&self, name: &str, topology: &str, apps: Vec<ScenarioApp>) {
        let md = Metadata::named(name).with_annotation("topology", topology);
        self.put(Document::from_spec(Kind::Scenario, md, &ScenarioSpec { apps }).unwrap());
    }
}

fn node(idx: usize) -> Node {
    let hostname = format!("host-{idx:02}");
    Node {
        node_type: "VirtualMachine".into(),
        general: General {
            hostname,
            ..Default::default()
        },
        hardware: Hardware {
            os_type: "linux".into(),
            vcpus: 1,
            memory: 1024,
            ..Default::default()
        },
        network: Network {
            interfaces: vec![Interface {
                name: "IF0".into(),
                vlan: "EXP".into(),
                proto: "static".into(),
                address: format!("10.0.0.{}", idx + 1),
                mask: 24,
                ..Default::default()
            }],
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Three linux VMs on one VLAN; `host-00` also serves NTP on `MGMT`.
fn basic_3_node() -> TopologySpec {
    let mut nodes: Vec<Node> = (0..3).map(node).collect();
    nodes[0].labels.insert("ntp-server".into(), "true".into());
    nodes[0].network.interfaces.push(Interface {
        name: "IF1".into(),
        vlan: "MGMT".into(),
        proto: "static".into(),
        address: "172.16.0.1".into(),
        mask: 16,
        ..Default::default()
    });
    TopologySpec { nodes }
}

fn experiment_app(name: &str) -> ScenarioApp {
    ScenarioApp {
        name: name.into(),
        ..Default::default()
    }
}

fn host_app(name: &str, hosts: &[&str]) -> ScenarioApp {
    ScenarioApp {
        name: name.into(),
        hosts: hosts
            .iter()
            .map(|h| AppHost {
                hostname: h.to_string(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

// ── Lifecycle state machine ─────────────────────────────────────────────

#[test]
fn concrete_net1_lifecycle() {
    let env = Env::new(3);
    let ctl = env.controller();

    let created = ctl.create(CreateRequest::new("net1", "basic-3-node")).unwrap().experiment;
    assert_eq!(created.metadata.annotation("topology"), Some("basic-3-node"));
    assert!(created.metadata.created.is_some());
    assert!(!created.running());

    let scheduled = ctl.schedule("net1", "round-robin").unwrap();
    let hosts: BTreeSet<&str> = scheduled.spec.schedules.values().map(String::as_str).collect();
    assert_eq!(scheduled.spec.schedules.len(), 3);
    assert_eq!(hosts.len(), 3, "each node on a distinct host");

    let dry = ctl.start(StartRequest::new("net1").dry_run(true)).unwrap().experiment;
    assert!(dry.running());
    assert!(dry.dry_run());
    assert!(dry.status.start_time.ends_with("-DRYRUN"));
    assert!(env.sim.namespaces().is_empty(), "dry run never touches the backend");

    let real = ctl.start(StartRequest::new("net1")).unwrap().experiment;
    assert!(real.running());
    assert!(!real.dry_run());
    assert_eq!(real.status.schedules, scheduled.spec.schedules);
    assert!(real.status.vlans.get("EXP").is_some_and(|id| *id != 0));

    let stopped = ctl.stop("net1").unwrap().experiment;
    assert!(!stopped.running());
    assert!(stopped.status.vlans.is_empty());
    assert!(env.sim.calls().contains(&"clear_namespace net1".to_string()));

    let err = ctl.stop("net1").unwrap_err();
    assert!(matches!(err.error(), ExperimentError::NotRunning(_)));
}

#[test]
fn builtin_apps_configure_and_render() {
    let env = Env::new(3);
    let ctl = env.controller();

    let exp = ctl.create(CreateRequest::new("net1", "basic-3-node")).unwrap().experiment;
    let server = exp.spec.topology.find_node("host-00").unwrap();
    assert!(server.injections.iter().any(|i| i.dst == "/etc/ntp.conf"));
    assert!(server.injections.iter().any(|i| i.dst == "/etc/network/interfaces"));

    let started = ctl.start(StartRequest::new("net1").dry_run(true)).unwrap().experiment;
    let base = &started.spec.base_dir;
    assert_eq!(base, &env.dir.path().join("experiments").join("net1"));
    assert!(base.join("startup").join("host-01-interfaces").is_file());
    assert!(base.join("ntp").join("host-00_ntp").is_file());
    assert!(base.join("scripts").join("net1.mm").is_file());
    assert_eq!(started.app_status("ntp").unwrap()["address"], "172.16.0.1");
}

#[test]
fn stop_requires_a_start_marker() {
    let env = Env::new(1);
    let ctl = env.controller();
    ctl.create(CreateRequest::new("net1", "basic-3-node")).unwrap();

    let err = ctl.stop("net1").unwrap_err();
    assert!(matches!(err.error(), ExperimentError::NotRunning(name) if name == "net1"));
    assert!(!err.is_retryable());
    assert!(err.to_string().contains(&format!("(ref {})", err.id())));
}

#[test]
fn real_start_twice_is_already_running() {
    let env = Env::new(2);
    let ctl = env.controller();
    ctl.create(CreateRequest::new("net1", "basic-3-node")).unwrap();
    ctl.start(StartRequest::new("net1")).unwrap();

    let writes = env.store.writes();
    let err = ctl.start(StartRequest::new("net1")).unwrap_err();
    assert!(matches!(err.error(), ExperimentError::AlreadyRunning { .. }));
    let err = ctl.start(StartRequest::new("net1").dry_run(true)).unwrap_err();
    assert!(matches!(err.error(), ExperimentError::AlreadyRunning { .. }));
    assert_eq!(env.store.writes(), writes);
}

#[test]
fn dry_run_marker_does_not_block_restart() {
    let env = Env::new(2);
    let ctl = env.controller();
    ctl.create(CreateRequest::new("net1", "basic-3-node")).unwrap();

    ctl.start(StartRequest::new("net1").dry_run(true)).unwrap();
    let again = ctl.start(StartRequest::new("net1").dry_run(true)).unwrap().experiment;
    assert!(again.dry_run());

    let stopped = ctl.stop("net1").unwrap().experiment;
    assert!(!stopped.running());
    assert!(
        !env.sim.calls().iter().any(|c| c.starts_with("clear_namespace")),
        "stopping a dry run leaves the backend alone"
    );
}

#[test]
fn create_twice_keeps_the_first_document() {
    let env = Env::new(1);
    let ctl = env.controller();
    ctl.create(CreateRequest::new("net1", "basic-3-node")).unwrap();
    let first = env.store.get(Kind::Experiment, "net1").unwrap();

    let err = ctl
        .create(CreateRequest::new("net1", "basic-3-node").with_vlan_range(200, 300))
        .unwrap_err();
    assert!(matches!(
        err.error(),
        ExperimentError::AlreadyExists {
            kind: Kind::Experiment,
            ..
        }
    ));
    assert_eq!(env.store.get(Kind::Experiment, "net1").unwrap(), first);
}

#[test]
fn delete_only_when_stopped() {
    let env = Env::new(2);
    let ctl = env.controller();
    ctl.create(CreateRequest::new("net1", "basic-3-node")).unwrap();
    ctl.start(StartRequest::new("net1")).unwrap();

    let err = ctl.delete("net1").unwrap_err();
    assert!(matches!(err.error(), ExperimentError::AlreadyRunning { .. }));

    ctl.stop("net1").unwrap();
    ctl.delete("net1").unwrap();
    let err = ctl.get("net1").unwrap_err();
    assert!(matches!(err.error(), ExperimentError::NotFound { .. }));
    assert!(ctl.list().unwrap().is_empty());
}

#[test]
fn undecodable_experiment_can_be_deleted_and_recreated() {
    let env = Env::new(2);
    let ctl = env.controller();
    env.put(Document::raw(
        Kind::Experiment,
        "v1",
        Metadata::named("broken"),
        json!({"scenario": {"apps": "garbage"}}),
    ));

    let err = ctl.get("broken").unwrap_err();
    assert!(matches!(err.error(), ExperimentError::UpgradeFailed(_)));
    let err = ctl.create(CreateRequest::new("broken", "basic-3-node")).unwrap_err();
    assert!(matches!(err.error(), ExperimentError::AlreadyExists { .. }));

    ctl.delete("broken").unwrap();
    assert!(!env.store.exists(Kind::Experiment, "broken").unwrap());
    ctl.create(CreateRequest::new("broken", "basic-3-node")).unwrap();
}

#[test]
fn undecodable_experiment_with_start_marker_is_kept() {
    let env = Env::new(2);
    let ctl = env.controller();
    let mut doc = Document::raw(
        Kind::Experiment,
        "v1",
        Metadata::named("broken"),
        json!({"scenario": {"apps": "garbage"}}),
    );
    doc.status = Some(json!({"startTime": "2026-10-16T12:00:00Z"}));
    env.put(doc);

    let err = ctl.delete("broken").unwrap_err();
    assert!(
        matches!(err.error(), ExperimentError::AlreadyRunning { started, .. } if started == "2026-10-16T12:00:00Z")
    );
    assert!(env.store.exists(Kind::Experiment, "broken").unwrap());
}

#[test]
fn schedule_refuses_started_experiments() {
    let env = Env::new(2);
    let ctl = env.controller();
    ctl.create(CreateRequest::new("net1", "basic-3-node")).unwrap();
    ctl.start(StartRequest::new("net1").dry_run(true)).unwrap();

    let err = ctl.schedule("net1", "round-robin").unwrap_err();
    assert!(matches!(err.error(), ExperimentError::AlreadyRunning { .. }));

    ctl.stop("net1").unwrap();
    let err = ctl.schedule("net1", "best-fit").unwrap_err();
    assert!(matches!(err.error(), ExperimentError::Scheduling(_)));
}

// ── Create preconditions ────────────────────────────────────────────────

#[test]
fn missing_topology_is_not_found() {
    let env = Env::new(1);
    let err = env
        .controller()
        .create(CreateRequest::new("net1", "nope"))
        .unwrap_err();
    assert!(matches!(
        err.error(),
        ExperimentError::NotFound {
            kind: Kind::Topology,
            ..
        }
    ));
    assert_eq!(env.store.writes(), 0);
}

#[test]
fn scenario_for_another_topology_is_a_mismatch() {
    let env = Env::new(1);
    env.put_scenario("s", "other-topology", vec![]);

    let err = env
        .controller()
        .create(CreateRequest::new("net1", "basic-3-node").with_scenario("s"))
        .unwrap_err();
    assert!(matches!(err.error(), ExperimentError::Mismatch { expected, .. } if expected == "other-topology"));
}

#[test]
fn unknown_scenario_host_fails_verification_before_apps() {
    let env = Env::new(1);
    env.put_scenario("s", "basic-3-node", vec![host_app("c", &["host-00", "ghost-host"])]);

    let mut apps = AppRegistry::new(env.apps_config());
    apps.register_default(env.recorder("a", false)).unwrap();
    apps.register(env.recorder("c", false)).unwrap();

    let err = env
        .controller_with(apps)
        .create(CreateRequest::new("net1", "basic-3-node").with_scenario("s"))
        .unwrap_err();
    assert!(matches!(err.error(), ExperimentError::Verification(problems) if problems[0].contains("ghost-host")));
    assert!(env.ran().is_empty());
    assert_eq!(env.store.writes(), 0);
}

#[test]
fn invalid_vlan_range_is_rejected() {
    let env = Env::new(1);
    let err = env
        .controller()
        .create(CreateRequest::new("net1", "basic-3-node").with_vlan_range(300, 200))
        .unwrap_err();
    assert!(matches!(err.error(), ExperimentError::InvalidRequest(_)));
}

#[test]
fn legacy_topology_is_upgraded_on_create() {
    let env = Env::new(1);
    env.put(Document::raw(
        Kind::Topology,
        "v0",
        Metadata::named("legacy"),
        json!({
            "nodes": [{
                "type": "VirtualMachine",
                "general": {"hostname": "old-1"},
                "hardware": {"vcpus": "2", "memory": "2048", "os_type": "linux"},
                "network": {"interfaces": [{"name": "IF0", "vlan": "EXP", "mask": "24"}]}
            }]
        }),
    ));

    let exp = env
        .controller()
        .create(CreateRequest::new("old", "legacy"))
        .unwrap()
        .experiment;
    let node = exp.spec.topology.find_node("old-1").unwrap();
    assert_eq!(node.hardware.vcpus, 2);
    assert_eq!(node.hardware.memory, 2048);
    assert_eq!(exp.spec.vlans.aliases.get("EXP"), Some(&0));
}

// ── App pipeline ────────────────────────────────────────────────────────

#[test]
fn configure_runs_defaults_then_scenario_apps() {
    let env = Env::new(1);
    env.put_scenario("s", "basic-3-node", vec![experiment_app("c"), experiment_app("d")]);

    let mut apps = AppRegistry::new(env.apps_config());
    apps.register_default(env.recorder("a", false)).unwrap();
    apps.register_default(env.recorder("b", false)).unwrap();
    apps.register(env.recorder("c", false)).unwrap();
    apps.register(env.recorder("d", false)).unwrap();

    let exp = env
        .controller_with(apps)
        .create(CreateRequest::new("net1", "basic-3-node").with_scenario("s"))
        .unwrap()
        .experiment;
    assert_eq!(env.ran(), ["a", "b", "c", "d"]);
    assert_eq!(exp.metadata.annotation("scenario"), Some("s"));
}

#[test]
fn failing_default_app_aborts_without_persisting() {
    let env = Env::new(1);
    env.put_scenario("s", "basic-3-node", vec![experiment_app("c"), experiment_app("d")]);

    let mut apps = AppRegistry::new(env.apps_config());
    apps.register_default(env.recorder("a", false)).unwrap();
    apps.register_default(env.recorder("b", true)).unwrap();
    apps.register(env.recorder("c", false)).unwrap();
    apps.register(env.recorder("d", false)).unwrap();

    let err = env
        .controller_with(apps)
        .create(CreateRequest::new("net1", "basic-3-node").with_scenario("s"))
        .unwrap_err();
    assert!(matches!(err.error(), ExperimentError::AppFailure(_)));
    assert_eq!(env.ran(), ["a", "b"]);
    assert_eq!(env.store.writes(), 0);
    assert!(!env.store.exists(Kind::Experiment, "net1").unwrap());
}

#[test]
fn missing_scenario_app_is_not_fatal() {
    let env = Env::new(1);
    env.put_scenario(
        "s",
        "basic-3-node",
        vec![experiment_app("not-installed"), host_app("c", &["host-01"])],
    );

    let mut apps = AppRegistry::new(env.apps_config());
    apps.register(env.recorder("c", false)).unwrap();

    let ctl = env.controller_with(apps);
    let created = ctl
        .create(CreateRequest::new("net1", "basic-3-node").with_scenario("s"))
        .unwrap();
    assert_eq!(env.ran(), ["c"]);
    assert_eq!(created.missing_apps(), ["not-installed"]);
    assert_eq!(created.reports[0].applied(), ["c"]);

    // Both start phases skip it; it is reported once.
    let started = ctl.start(StartRequest::new("net1").dry_run(true)).unwrap();
    assert_eq!(started.reports.len(), 2);
    assert!(started.reports.iter().all(|r| r.missing() == ["not-installed"]));
    assert_eq!(started.missing_apps(), ["not-installed"]);
}

// ── Locking ─────────────────────────────────────────────────────────────

#[test]
fn concurrent_create_fails_with_lock_conflict() {
    let env = Env::new(1);
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();

    let mut apps = AppRegistry::new(env.apps_config());
    apps.register_default(Gate {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    })
    .unwrap();
    let ctl = env.controller_with(apps);

    thread::scope(|s| {
        let first = s.spawn(|| ctl.create(CreateRequest::new("net1", "basic-3-node")));
        entered_rx.recv().unwrap();

        let writes = env.store.writes();
        let err = ctl.create(CreateRequest::new("net1", "basic-3-node")).unwrap_err();
        assert!(matches!(err.error(), ExperimentError::LockConflict(_)));
        assert!(err.is_retryable());
        assert_eq!(env.store.writes(), writes, "loser never writes");

        release_tx.send(()).unwrap();
        first.join().unwrap().unwrap();
    });

    assert!(ctl.locks().is_empty());
    assert!(env.store.exists(Kind::Experiment, "net1").unwrap());
}

// ── Backend failures ────────────────────────────────────────────────────

#[test]
fn backend_failure_cleans_up_namespace() {
    let env = Env::new(2);
    let ctl = env.controller();
    ctl.create(CreateRequest::new("net1", "basic-3-node")).unwrap();
    let writes = env.store.writes();

    env.sim.fail_on("vlans");
    let err = ctl.start(StartRequest::new("net1")).unwrap_err();
    assert!(matches!(err.error(), ExperimentError::Backend(_)));

    let calls = env.sim.calls();
    assert_eq!(calls.last().map(String::as_str), Some("clear_namespace net1"));
    assert!(env.sim.vm_info("net1").is_err(), "namespace torn down");
    assert_eq!(env.store.writes(), writes);
    assert!(!ctl.get("net1").unwrap().running());

    // The failure was transient; a retry starts cleanly.
    assert!(ctl.start(StartRequest::new("net1")).unwrap().experiment.running());
}

#[test]
fn failed_save_after_launch_cleans_up_namespace() {
    let env = Env::new(2);
    let ctl = env.controller();
    ctl.create(CreateRequest::new("net1", "basic-3-node")).unwrap();

    env.store.fail_updates(true);
    let err = ctl.start(StartRequest::new("net1")).unwrap_err();
    assert!(matches!(err.error(), ExperimentError::Store(_)));
    assert_eq!(env.sim.calls().last().map(String::as_str), Some("clear_namespace net1"));
    assert!(env.sim.namespaces().is_empty());
    assert!(!ctl.get("net1").unwrap().running());

    env.store.fail_updates(false);
    assert!(ctl.start(StartRequest::new("net1")).unwrap().experiment.running());
    assert_eq!(env.sim.namespaces(), ["net1"]);
}

#[test]
fn start_overrides_vlans() {
    let env = Env::new(2);
    let ctl = env.controller();
    ctl.create(CreateRequest::new("net1", "basic-3-node")).unwrap();

    let exp = ctl
        .start(
            StartRequest::new("net1")
                .with_vlan_range(500, 600)
                .with_vlan_alias("EXP", 550),
        )
        .unwrap()
        .experiment;
    assert_eq!(exp.status.vlans.get("EXP"), Some(&550));
    let mgmt = exp.status.vlans["MGMT"];
    assert!((500..=600).contains(&mgmt));
}

#[test]
fn start_overrides_each_vlan_bound_separately() {
    let env = Env::new(2);
    let ctl = env.controller();
    ctl.create(CreateRequest::new("net1", "basic-3-node").with_vlan_range(100, 200))
        .unwrap();

    let exp = ctl
        .start(StartRequest::new("net1").dry_run(true).with_vlan_range(150, 0))
        .unwrap()
        .experiment;
    assert_eq!((exp.spec.vlans.min, exp.spec.vlans.max), (150, 200));

    let exp = ctl
        .start(StartRequest::new("net1").dry_run(true).with_vlan_range(0, 180))
        .unwrap()
        .experiment;
    assert_eq!((exp.spec.vlans.min, exp.spec.vlans.max), (150, 180));

    let err = ctl
        .start(StartRequest::new("net1").dry_run(true).with_vlan_range(190, 0))
        .unwrap_err();
    assert!(matches!(err.error(), ExperimentError::InvalidRequest(_)));
}

// ── VLAN settings ───────────────────────────────────────────────────────

#[test]
fn vlan_settings_apply_to_stopped_experiments() {
    let env = Env::new(2);
    let ctl = env.controller();
    ctl.create(CreateRequest::new("net1", "basic-3-node")).unwrap();

    ctl.set_vlan_range("net1", 100, 200, false).unwrap();
    let err = ctl.set_vlan_range("net1", 300, 400, false).unwrap_err();
    assert!(matches!(err.error(), ExperimentError::InvalidRequest(msg) if msg.contains("already exists")));

    ctl.set_vlan_alias("net1", "EXP", 150, false).unwrap();
    let err = ctl.set_vlan_alias("net1", "EXP", 160, false).unwrap_err();
    assert!(matches!(err.error(), ExperimentError::InvalidRequest(_)));
    ctl.set_vlan_alias("net1", "EXP", 160, true).unwrap();
    let err = ctl.set_vlan_alias("net1", "MGMT", 900, false).unwrap_err();
    assert!(matches!(err.error(), ExperimentError::InvalidRequest(msg) if msg.contains("greater than")));
    // A forced range must still hold every pinned alias.
    assert!(ctl.set_vlan_range("net1", 300, 400, true).is_err());

    let aliases = ctl.vlan_aliases(Some("net1")).unwrap();
    assert_eq!(aliases["net1"], BTreeMap::from([("EXP".to_string(), 160), ("MGMT".to_string(), 0)]));
    assert_eq!(ctl.vlan_ranges(None).unwrap()["net1"], VlanRange { min: 100, max: 200 });

    let exp = ctl.start(StartRequest::new("net1")).unwrap().experiment;
    assert_eq!(exp.status.vlans["EXP"], 160);

    let aliases = ctl.vlan_aliases(None).unwrap();
    assert_eq!(aliases["net1"], exp.status.vlans);
    let range = ctl.vlan_ranges(Some("net1")).unwrap()["net1"];
    assert!(100 <= range.min && range.min <= 160 && 160 <= range.max && range.max <= 200);

    let err = ctl.set_vlan_alias("net1", "EXP", 170, true).unwrap_err();
    assert!(matches!(err.error(), ExperimentError::AlreadyRunning { .. }));
    let err = ctl.set_vlan_range("net1", 100, 300, true).unwrap_err();
    assert!(matches!(err.error(), ExperimentError::AlreadyRunning { .. }));
    assert!(ctl.locks().is_empty());
}

#[test]
fn vlan_settings_validate_their_arguments() {
    let env = Env::new(1);
    let ctl = env.controller();
    ctl.create(CreateRequest::new("net1", "basic-3-node")).unwrap();
    let writes = env.store.writes();

    for err in [
        ctl.set_vlan_alias("net1", "", 10, false).unwrap_err(),
        ctl.set_vlan_alias("net1", "EXP", 0, false).unwrap_err(),
        ctl.set_vlan_range("net1", 0, 10, false).unwrap_err(),
        ctl.set_vlan_range("net1", 20, 10, false).unwrap_err(),
    ] {
        assert!(matches!(err.error(), ExperimentError::InvalidRequest(_)));
    }
    let err = ctl.vlan_aliases(Some("ghost")).unwrap_err();
    assert!(matches!(err.error(), ExperimentError::NotFound { .. }));
    assert_eq!(env.store.writes(), writes);
}

// ── VM operations ───────────────────────────────────────────────────────

#[test]
fn vm_operations_on_running_experiment() {
    let env = Env::new(2);
    let ctl = env.controller();
    ctl.create(CreateRequest::new("net1", "basic-3-node")).unwrap();
    let exp = ctl.start(StartRequest::new("net1")).unwrap().experiment;

    ctl.stop_vm("net1", "host-01").unwrap();
    let vm = |name: &str| ctl.vms("net1").unwrap().into_iter().find(|v| v.name == name).unwrap();
    assert_eq!(vm("host-01").state, VmState::Paused);
    ctl.start_vm("net1", "host-01").unwrap();
    assert_eq!(vm("host-01").state, VmState::Running);

    ctl.disconnect_interface("net1", "host-00", 1).unwrap();
    assert_eq!(vm("host-00").vlans, ["EXP", ""]);
    ctl.connect_interface("net1", "host-00", 1, "EXP").unwrap();
    assert_eq!(vm("host-00").vlans, ["EXP", "EXP"]);

    let path = ctl.start_capture("net1", "host-00", 0).unwrap();
    assert_eq!(path, capture_path(&exp, "host-00", 0));
    assert!(path.ends_with("captures/host-00-0.pcap"));
    assert!(path.parent().unwrap().is_dir());
    assert_eq!(ctl.captures("net1").unwrap().len(), 1);
    ctl.stop_capture("net1", "host-00").unwrap();
    assert!(ctl.captures("net1").unwrap().is_empty());

    ctl.kill_vm("net1", "host-02").unwrap();
    assert_eq!(vm("host-02").state, VmState::Quit);
    assert!(ctl.locks().is_empty());
}

#[test]
fn vm_operations_validate_their_target() {
    let env = Env::new(2);
    let ctl = env.controller();
    ctl.create(CreateRequest::new("net1", "basic-3-node")).unwrap();

    let err = ctl.start_vm("net1", "host-00").unwrap_err();
    assert!(matches!(err.error(), ExperimentError::NotRunning(_)));

    ctl.start(StartRequest::new("net1").dry_run(true)).unwrap();
    let err = ctl.start_vm("net1", "host-00").unwrap_err();
    assert!(matches!(err.error(), ExperimentError::InvalidRequest(_)));
    ctl.stop("net1").unwrap();

    ctl.start(StartRequest::new("net1")).unwrap();
    let err = ctl.start_vm("net1", "nobody").unwrap_err();
    assert!(matches!(err.error(), ExperimentError::VmNotFound { vm, .. } if vm == "nobody"));
    let err = ctl.start_capture("net1", "host-01", 4).unwrap_err();
    assert!(matches!(err.error(), ExperimentError::InvalidRequest(_)));
}

#[test]
fn progress_reports_launched_fraction() {
    let env = Env::new(2);
    let ctl = env.controller();
    ctl.create(CreateRequest::new("net1", "basic-3-node")).unwrap();
    ctl.start(StartRequest::new("net1")).unwrap();

    assert_eq!(ctl.progress("net1", 3).unwrap(), 1.0);
    assert_eq!(ctl.progress("net1", 0).unwrap(), 1.0);
    assert!(ctl.progress("other", 3).is_err());
}
