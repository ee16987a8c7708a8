//! End-to-end tests: invocations marshaled on the client side, carried by the
//! loopback channel, and dispatched to servants through an object adapter.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use slicerpc::Arguments;
use slicerpc::Channel;
use slicerpc::ChannelError;
use slicerpc::ClassDescriptor;
use slicerpc::ExceptionDescriptor;
use slicerpc::HandlerError;
use slicerpc::Host;
use slicerpc::Identity;
use slicerpc::InterfaceDescriptor;
use slicerpc::InvokeError;
use slicerpc::LoopbackChannel;
use slicerpc::Member;
use slicerpc::ObjectAdapter;
use slicerpc::ObjectValue;
use slicerpc::OperationDescriptor;
use slicerpc::OperationMetadata;
use slicerpc::Proxy;
use slicerpc::Registry;
use slicerpc::Reply;
use slicerpc::ReplyStatus;
use slicerpc::Request;
use slicerpc::Servant;
use slicerpc::TypeDescriptor;
use slicerpc::UserException;
use slicerpc::Value;

const HELLO: &str = "::Demo::Hello";

struct World {
    host: Host,
    registry: Arc<Registry>,
    iface: Arc<InterfaceDescriptor>,
    base: Arc<ClassDescriptor>,
    proxy: Proxy,
    notified: Arc<AtomicUsize>,
}

impl World {
    fn op(&self, name: &str) -> Arc<OperationDescriptor> {
        self.iface.operation(name).unwrap()
    }
}

fn world() -> World {
    let registry = Registry::new();
    let e1 = registry
        .register_exception(ExceptionDescriptor::new(
            "::Demo::E1",
            None,
            vec![Member::new("reason", TypeDescriptor::string())],
        ))
        .unwrap();
    registry
        .register_exception(ExceptionDescriptor::new(
            "::Demo::E2",
            Some(e1),
            vec![Member::new("code", TypeDescriptor::int())],
        ))
        .unwrap();
    registry
        .register_exception(ExceptionDescriptor::new("::Demo::E3", None, vec![]))
        .unwrap();
    let base = registry
        .register_class(ClassDescriptor::new(
            "::Demo::Base",
            None,
            vec![Member::new("name", TypeDescriptor::string())],
        ))
        .unwrap();

    let objects = TypeDescriptor::sequence(TypeDescriptor::Class(Arc::clone(&base)));
    let iface = registry
        .define_interface(HELLO, vec![
            OperationMetadata::new("greet").input(TypeDescriptor::string()).returns(TypeDescriptor::string()),
            OperationMetadata::new("fail").input(TypeDescriptor::int()).throws("::Demo::E1"),
            OperationMetadata::new("notify").input(TypeDescriptor::string()),
            OperationMetadata::new("whoami").returns(TypeDescriptor::string()),
            OperationMetadata::new("share").input(objects.clone()).returns(objects),
            OperationMetadata::new("quit"),
            OperationMetadata::new("missing"),
        ])
        .unwrap();

    let registry = Arc::new(registry);
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);

    let servant = Servant::new(HELLO)
        .with_method("greet", |args: Arguments| match args.get(0) {
            Value::String(name) => Ok(Value::string(format!("hello, {}", name))),
            other => Err(HandlerError::Local(format!("unexpected {}", other.kind()))),
        })
        .with_method("fail", |args: Arguments| {
            let ex = match args.get(0) {
                Value::Int(1) => UserException::new("::Demo::E1").with("reason", Value::string("one")),
                Value::Int(2) => UserException::new("::Demo::E2")
                    .with("reason", Value::string("two"))
                    .with("code", Value::Int(2)),
                _ => UserException::new("::Demo::E3"),
            };
            Err(ex.into())
        })
        .with_method("notify", move |_: Arguments| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::None)
        })
        .with_method("whoami", |args: Arguments| {
            let who = args.current.ctx.get("user").cloned().unwrap_or_default();
            Ok(Value::string(format!("{}@{}", who, args.current.adapter)))
        })
        .with_method("share", |args: Arguments| Ok(args.get(0).clone()))
        .with_method("quit", |_: Arguments| Err(HandlerError::Exit(7)));

    let host = Host::new();
    let adapter = Arc::new(ObjectAdapter::new("demo-adapter", Arc::clone(&registry)));
    adapter.add(Identity::new("hello"), servant);

    let channel: Arc<dyn Channel> = Arc::new(LoopbackChannel::new(adapter, host.clone()));
    let proxy = Proxy::new(Identity::new("hello"), channel, Arc::clone(&registry));

    World { host, registry, iface, base, proxy, notified }
}

// --- Results ---

#[tokio::test]
async fn test_twoway_call_returns_result() {
    let w = world();
    let mut host = w.host.enter().await;
    let v = w.op("greet").invoke(&mut host, &w.proxy, &[Value::string("ice")]).await.unwrap();
    assert_eq!(v, Some(Value::string("hello, ice")));
}

#[tokio::test]
async fn test_context_reaches_servant() {
    let w = world();
    let mut host = w.host.enter().await;
    let ctx = Value::context([("user", "alice")]);
    let v = w.op("whoami").invoke(&mut host, &w.proxy, &[ctx]).await.unwrap();
    assert_eq!(v, Some(Value::string("alice@demo-adapter")));

    let v = w.op("whoami").invoke(&mut host, &w.proxy, &[Value::None]).await.unwrap();
    assert_eq!(v, Some(Value::string("@demo-adapter")));
}

#[tokio::test]
async fn test_shared_objects_survive_round_trip() {
    let w = world();
    let mut host = w.host.enter().await;
    let obj = Arc::new(ObjectValue::new(Arc::clone(&w.base)).with("name", Value::string("twin")));
    let arg = Value::Sequence(vec![Value::Object(Arc::clone(&obj)), Value::Object(obj), Value::None]);

    let v = w.op("share").invoke(&mut host, &w.proxy, &[arg.clone()]).await.unwrap().unwrap();
    assert_eq!(v, arg);
    let Value::Sequence(items) = v else { panic!("expected a sequence") };
    match (&items[0], &items[1]) {
        (Value::Object(a), Value::Object(b)) => assert!(Arc::ptr_eq(a, b)),
        other => panic!("expected objects, got {:?}", other),
    }
}

// --- Exceptions ---

#[tokio::test]
async fn test_declared_exception_arrives_typed() {
    let w = world();
    let mut host = w.host.enter().await;

    let err = w.op("fail").invoke(&mut host, &w.proxy, &[Value::Int(1)]).await.unwrap_err();
    assert_eq!(err, InvokeError::User(UserException::new("::Demo::E1").with("reason", Value::string("one"))));

    let err = w.op("fail").invoke(&mut host, &w.proxy, &[Value::Int(2)]).await.unwrap_err();
    let ex = match err {
        InvokeError::User(ex) => ex,
        other => panic!("expected a user exception, got {:?}", other),
    };
    assert_eq!(ex.type_id, "::Demo::E2");
    assert_eq!(ex.member("reason"), Some(&Value::string("two")));
    assert_eq!(ex.member("code"), Some(&Value::Int(2)));
}

#[tokio::test]
async fn test_undeclared_exception_is_unknown() {
    let w = world();
    let mut host = w.host.enter().await;
    let err = w.op("fail").invoke(&mut host, &w.proxy, &[Value::Int(3)]).await.unwrap_err();
    assert_eq!(
        err,
        InvokeError::Channel(ChannelError::UnknownUserException { unknown: "::Demo::E3".into() })
    );
}

#[tokio::test]
async fn test_handler_exit_reaches_caller() {
    let w = world();
    let mut host = w.host.enter().await;
    let err = w.op("quit").invoke(&mut host, &w.proxy, &[]).await.unwrap_err();
    assert_eq!(err, InvokeError::Exit { code: 7 });

    let err = w.op("quit").invoke(&mut host, &w.proxy.clone().oneway(), &[]).await.unwrap_err();
    assert_eq!(err, InvokeError::Exit { code: 7 });
    assert!(w.host.is_held());
}

// --- Routing ---

#[tokio::test]
async fn test_missing_method_is_operation_not_exist() {
    let w = world();
    let mut host = w.host.enter().await;
    let err = w.op("missing").invoke(&mut host, &w.proxy, &[]).await.unwrap_err();
    assert_eq!(
        err,
        InvokeError::Channel(ChannelError::OperationNotExist {
            identity: Identity::new("hello"),
            operation: "missing".into(),
        })
    );
}

#[tokio::test]
async fn test_unknown_identity_and_operation() {
    let w = world();
    let mut host = w.host.enter().await;

    let stranger = Proxy::new(Identity::new("nobody"), Arc::clone(w.proxy.channel()), Arc::clone(&w.registry));
    let err = w.op("whoami").invoke(&mut host, &stranger, &[]).await.unwrap_err();
    assert_eq!(err, InvokeError::Channel(ChannelError::ObjectNotExist { identity: Identity::new("nobody") }));

    let bogus = OperationDescriptor::new(&w.registry, OperationMetadata::new("bogus")).unwrap();
    let err = bogus.invoke(&mut host, &w.proxy, &[]).await.unwrap_err();
    assert!(matches!(err, InvokeError::Channel(ChannelError::OperationNotExist { .. })));
}

#[tokio::test]
async fn test_oneway_dispatches_without_reply() {
    let w = world();
    let mut host = w.host.enter().await;
    let oneway = w.proxy.clone().oneway();

    let v = w.op("notify").invoke(&mut host, &oneway, &[Value::string("ping")]).await.unwrap();
    assert_eq!(v, None);
    assert_eq!(w.notified.load(Ordering::SeqCst), 1);

    // Failures other than an exit request are swallowed on oneway requests.
    let v = w.op("fail").invoke(&mut host, &oneway, &[Value::Int(1)]).await.unwrap();
    assert_eq!(v, None);
}

// --- Host exclusivity ---

/// Records whether the host was held while a request was in flight.
struct RecordingChannel {
    host: Host,
    held_during_send: Mutex<Option<bool>>,
}

#[async_trait::async_trait]
impl Channel for RecordingChannel {
    async fn send(&self, _request: Request<'_>) -> slicerpc::channel::Result<Reply> {
        *self.held_during_send.lock().unwrap() = Some(self.host.is_held());
        Ok(Reply { status: ReplyStatus::Success, body: Vec::new() })
    }
}

#[tokio::test]
async fn test_host_released_during_send() {
    let w = world();
    let recorder = Arc::new(RecordingChannel { host: w.host.clone(), held_during_send: Mutex::new(None) });
    let channel: Arc<dyn Channel> = recorder.clone();
    let proxy = Proxy::new(Identity::new("hello"), channel, Arc::clone(&w.registry));

    let mut host = w.host.enter().await;
    w.op("notify").invoke(&mut host, &proxy, &[Value::string("x")]).await.unwrap();

    assert_eq!(*recorder.held_during_send.lock().unwrap(), Some(false));
    assert!(w.host.is_held());
}
