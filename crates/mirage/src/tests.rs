//! Tests for the runtime protocol against scripted in-memory hosts.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::cancel::CancelSource;
use crate::cancel::CancelToken;
use crate::executor;
use crate::executor::Executor;
use crate::message::Envelope;
use crate::message::Fault;
use crate::message::InstanceId;
use crate::message::Reply;
use crate::message::Request;
use crate::mock_transport::DuplexTransport;
use crate::owner::ExecutorOwner;
use crate::provider::CreationContext;
use crate::provider::OwnerProvider;
use crate::provider::SharedOwnerProvider;
use crate::shell;
use crate::shell::IllusionShell;
use crate::shell::create_object;

/// Installs a test subscriber once; `RUST_LOG` controls verbosity.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Request counters exposed by a scripted host.
#[derive(Clone, Default)]
struct HostCounters {
    creates: Arc<AtomicUsize>,
    invokes: Arc<AtomicUsize>,
    disposals: Arc<AtomicUsize>,
}

/// Spawns a host task serving the far side of a duplex pair.
///
/// Creations are acknowledged (or failed when `fail_create` is set),
/// invocations echo their parameter pack back, disposal notices are
/// counted and never answered.
fn spawn_host(transport: DuplexTransport, fail_create: bool) -> HostCounters {
    let counters = HostCounters::default();
    let host = counters.clone();

    tokio::spawn(async move {
        use crate::transport::Transport;
        while let Ok(Some(payload)) = transport.recv().await {
            let Ok(Envelope::Request(request)) = Envelope::decode(&payload) else {
                continue;
            };
            match request {
                Request::CreateObjectInstance { seq, .. } => {
                    host.creates.fetch_add(1, Ordering::SeqCst);
                    let status = if fail_create {
                        Err(Fault::Invocation("constructor raised".into()))
                    } else {
                        Ok(Vec::new())
                    };
                    let reply = Envelope::Reply(Reply { seq, status }).encode().unwrap();
                    let _ = transport.send(&reply).await;
                }
                Request::InvokeMethod { seq, pack, .. } => {
                    host.invokes.fetch_add(1, Ordering::SeqCst);
                    let reply = Envelope::Reply(Reply {
                        seq,
                        status: Ok(pack),
                    })
                    .encode()
                    .unwrap();
                    let _ = transport.send(&reply).await;
                }
                Request::DisposeObjectInstance { .. } => {
                    host.disposals.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    });

    counters
}

/// Builds an executor wired to a fresh echo host.
fn echo_executor() -> (Arc<Executor>, HostCounters) {
    let (client, host) = DuplexTransport::pair();
    let counters = spawn_host(host, false);
    (Executor::new(Arc::new(client)), counters)
}

/// Polls a condition for up to a second, yielding between checks.
async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn invoke_round_trips_through_host() {
    init_tracing();
    let (executor, counters) = echo_executor();
    let owner = ExecutorOwner::new(executor.clone());

    let instance_id = executor.next_instance_id();
    executor
        .create_object_instance(instance_id, b"ctor-pack".to_vec(), &CancelToken::never())
        .await
        .unwrap();

    let shell = IllusionShell::new(owner, instance_id);
    let result = shell
        .invoke("greet", b"hello".to_vec(), &CancelToken::never())
        .await
        .unwrap();

    assert_eq!(result, b"hello");
    assert_eq!(counters.creates.load(Ordering::SeqCst), 1);
    assert_eq!(counters.invokes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn instance_ids_are_monotone_per_executor() {
    let (executor, _counters) = echo_executor();
    let first = executor.next_instance_id();
    let second = executor.next_instance_id();
    let third = executor.next_instance_id();
    assert!(first.0 < second.0 && second.0 < third.0);
}

#[tokio::test]
async fn double_dispose_sends_single_notice() {
    let (executor, counters) = echo_executor();
    let owner = ExecutorOwner::new(executor.clone());
    let base = owner.share();

    let shell = IllusionShell::new(owner, executor.next_instance_id());
    shell.dispose();
    shell.dispose();

    assert!(
        eventually(|| counters.disposals.load(Ordering::SeqCst) == 1).await,
        "expected exactly one disposal notice"
    );
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(counters.disposals.load(Ordering::SeqCst), 1);
    drop(base);
}

#[tokio::test]
async fn concurrent_dispose_is_idempotent() {
    let (executor, counters) = echo_executor();
    let owner = ExecutorOwner::new(executor.clone());
    let base = owner.share();

    let shell = Arc::new(IllusionShell::new(owner, executor.next_instance_id()));
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let shell = shell.clone();
        tasks.push(tokio::spawn(async move { shell.dispose() }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert!(!shell.is_available());
    assert!(eventually(|| counters.disposals.load(Ordering::SeqCst) == 1).await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(counters.disposals.load(Ordering::SeqCst), 1);
    drop(base);
}

#[tokio::test]
async fn use_after_dispose_fails_fast() {
    let (executor, counters) = echo_executor();
    let owner = ExecutorOwner::new(executor.clone());

    let shell = IllusionShell::new(owner, executor.next_instance_id());
    shell.dispose();

    let err = shell
        .invoke("greet", Vec::new(), &CancelToken::never())
        .await
        .unwrap_err();
    assert!(matches!(err, shell::Error::Disposed));
    assert_eq!(counters.invokes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn running_token_cancellation_disposes_every_proxy() {
    init_tracing();
    let (executor, _counters) = echo_executor();
    let owner = ExecutorOwner::new(executor.clone());

    let first = IllusionShell::new(owner.share(), executor.next_instance_id());
    let second = IllusionShell::new(owner.share(), executor.next_instance_id());
    assert!(first.is_available() && second.is_available());

    executor.shutdown();

    assert!(
        eventually(|| !first.is_available() && !second.is_available()).await,
        "proxies should observe executor shutdown without a local dispose"
    );
}

#[tokio::test]
async fn failed_creation_disposes_acquired_owner() {
    // Provider that activates a fresh executor per acquisition, wired to a
    // host whose constructor always raises.
    struct FailingActivator {
        last: tokio::sync::Mutex<Option<Arc<Executor>>>,
    }

    #[async_trait::async_trait]
    impl OwnerProvider for FailingActivator {
        async fn get_executor_owner(
            &self,
            _ctx: &CreationContext,
            _cancel: &CancelToken,
        ) -> crate::provider::Result<ExecutorOwner> {
            let (client, host) = DuplexTransport::pair();
            spawn_host(host, true);
            let executor = Executor::new(Arc::new(client));
            *self.last.lock().await = Some(executor.clone());
            Ok(ExecutorOwner::new(executor))
        }
    }

    let provider = FailingActivator {
        last: tokio::sync::Mutex::new(None),
    };
    let ctx = CreationContext::constructor("demo::Greeter");

    let err = create_object(&provider, &ctx, Vec::new(), &CancelToken::never())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        shell::Error::Executor(executor::Error::Remote(Fault::Invocation(_)))
    ));

    // The acquired owner was the executor's only holder, so disposal must
    // have shut the executor down.
    let executor = provider.last.lock().await.clone().unwrap();
    assert!(eventually(|| !executor.is_running()).await);
}

#[tokio::test]
async fn pre_cancelled_token_registers_nothing() {
    let (executor, counters) = echo_executor();
    let owner = ExecutorOwner::new(executor);
    let provider = SharedOwnerProvider::new(owner);
    let ctx = CreationContext::constructor("demo::Greeter");

    let source = CancelSource::new();
    source.cancel();

    let err = create_object(&provider, &ctx, Vec::new(), &source.token())
        .await
        .unwrap_err();
    assert!(matches!(err, shell::Error::Cancelled));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(counters.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancelling_in_flight_invocation() {
    // Host side kept alive but silent: requests are read and dropped.
    let (client, host) = DuplexTransport::pair();
    tokio::spawn(async move {
        use crate::transport::Transport;
        while let Ok(Some(_)) = host.recv().await {}
    });

    let executor = Executor::new(Arc::new(client));
    let source = CancelSource::new();
    let token = source.token();

    let pending = tokio::spawn({
        let executor = executor.clone();
        async move {
            executor
                .invoke_method(InstanceId(1), "greet", Vec::new(), &token)
                .await
        }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    source.cancel();

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, executor::Error::Cancelled));
}

#[tokio::test]
async fn pump_failure_fails_pending_and_cancels_running_token() {
    let (client, host) = DuplexTransport::pair();
    let executor = Executor::new(Arc::new(client));
    let running = executor.running_token();

    let pending = tokio::spawn({
        let executor = executor.clone();
        async move {
            executor
                .invoke_method(InstanceId(1), "greet", Vec::new(), &CancelToken::never())
                .await
        }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(host);

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        executor::Error::Transport(_) | executor::Error::ChannelClosed
    ));
    assert!(eventually(|| running.is_cancelled()).await);
}

#[tokio::test]
async fn last_owner_holder_triggers_shutdown() {
    let (executor, _counters) = echo_executor();
    let owner = ExecutorOwner::new(executor.clone());
    let a = owner.share();
    let b = owner.share();

    owner.dispose();
    a.dispose();
    assert!(executor.is_running());

    // Duplicate dispose of an already-released handle changes nothing.
    a.dispose();
    assert!(executor.is_running());

    b.dispose();
    assert!(!executor.is_running());
}

#[tokio::test]
async fn invoking_after_shutdown_fails() {
    let (executor, _counters) = echo_executor();
    executor.shutdown();

    let err = executor
        .invoke_method(InstanceId(1), "greet", Vec::new(), &CancelToken::never())
        .await
        .unwrap_err();
    assert!(matches!(err, executor::Error::Shutdown));
}

#[test]
fn envelope_round_trips_through_framing() {
    let request = Envelope::Request(Request::InvokeMethod {
        instance_id: InstanceId(7),
        seq: 42,
        method: "greet".into(),
        pack: vec![1, 2, 3],
    });
    let decoded = Envelope::decode(&request.encode().unwrap()).unwrap();
    match decoded {
        Envelope::Request(Request::InvokeMethod {
            instance_id,
            seq,
            method,
            pack,
        }) => {
            assert_eq!(instance_id, InstanceId(7));
            assert_eq!(seq, 42);
            assert_eq!(method, "greet");
            assert_eq!(pack, vec![1, 2, 3]);
        }
        other => panic!("unexpected frame: {:?}", other),
    }

    let reply = Envelope::Reply(Reply {
        seq: 42,
        status: Err(Fault::MethodNotFound),
    });
    let decoded = Envelope::decode(&reply.encode().unwrap()).unwrap();
    match decoded {
        Envelope::Reply(Reply { seq, status }) => {
            assert_eq!(seq, 42);
            assert_eq!(status, Err(Fault::MethodNotFound));
        }
        other => panic!("unexpected frame: {:?}", other),
    }
}

#[test]
fn block_on_works_outside_a_runtime() {
    let value = shell::block_on(async { Ok(7) }).unwrap();
    assert_eq!(value, 7);
}
