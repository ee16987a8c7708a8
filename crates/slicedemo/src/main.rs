//! A bank account served and called in one process over the loopback channel.
//!
//! Run with `RUST_LOG=debug` to see the invocation and dispatch lifecycle.

use std::sync::Arc;
use std::sync::Mutex;

use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use slicerpc::Arguments;
use slicerpc::Channel;
use slicerpc::ExceptionDescriptor;
use slicerpc::HandlerError;
use slicerpc::Host;
use slicerpc::Identity;
use slicerpc::InterfaceDescriptor;
use slicerpc::InvokeError;
use slicerpc::LoopbackChannel;
use slicerpc::Member;
use slicerpc::ObjectAdapter;
use slicerpc::OperationMetadata;
use slicerpc::Proxy;
use slicerpc::Registry;
use slicerpc::Servant;
use slicerpc::TypeDescriptor;
use slicerpc::UserException;
use slicerpc::Value;

const ACCOUNT: &str = "::Bank::Account";

fn define(registry: &Registry) -> anyhow::Result<Arc<InterfaceDescriptor>> {
    registry.register_exception(ExceptionDescriptor::new(
        "::Bank::Overdrawn",
        None,
        vec![Member::new("shortfall", TypeDescriptor::long())],
    ))?;

    let iface = registry.define_interface(ACCOUNT, vec![
        OperationMetadata::new("deposit").input(TypeDescriptor::long()).returns(TypeDescriptor::long()),
        OperationMetadata::new("withdraw")
            .input(TypeDescriptor::long())
            .returns(TypeDescriptor::long())
            .throws("::Bank::Overdrawn"),
        OperationMetadata::new("statement")
            .idempotent()
            .output(TypeDescriptor::long())
            .returns(TypeDescriptor::string()),
        OperationMetadata::new("audit").input(TypeDescriptor::string()),
    ])?;
    Ok(iface)
}

fn amount(args: &Arguments) -> Result<i64, HandlerError> {
    match args.get(0) {
        Value::Long(n) => Ok(*n),
        other => Err(HandlerError::Local(format!("expected long, got {}", other.kind()))),
    }
}

fn account(balance: Arc<Mutex<i64>>) -> Servant {
    let (b1, b2, b3) = (Arc::clone(&balance), Arc::clone(&balance), balance);
    Servant::new(ACCOUNT)
        .with_method("deposit", move |args: Arguments| {
            let mut balance = b1.lock().map_err(|_| HandlerError::Local("balance poisoned".into()))?;
            *balance += amount(&args)?;
            Ok(Value::Long(*balance))
        })
        .with_method("withdraw", move |args: Arguments| {
            let mut balance = b2.lock().map_err(|_| HandlerError::Local("balance poisoned".into()))?;
            let n = amount(&args)?;
            if n > *balance {
                let ex = UserException::new("::Bank::Overdrawn").with("shortfall", Value::Long(n - *balance));
                return Err(ex.into());
            }
            *balance -= n;
            Ok(Value::Long(*balance))
        })
        .with_method("statement", move |args: Arguments| {
            let balance = b3.lock().map_err(|_| HandlerError::Local("balance poisoned".into()))?;
            let owner = args.current.ctx.get("owner").cloned().unwrap_or_else(|| "anonymous".into());
            Ok(Value::Tuple(vec![Value::string(format!("statement for {}", owner)), Value::Long(*balance)]))
        })
        .with_method("audit", |args: Arguments| {
            info!(note = ?args.get(0), id = %args.current.id, "audit note received");
            Ok(Value::None)
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let registry = Arc::new(Registry::new());
    let iface = define(&registry)?;
    let op = |name: &str| {
        iface.operation(name).ok_or_else(|| anyhow::anyhow!("{} has no operation {}", ACCOUNT, name))
    };

    let host = Host::new();
    let adapter = Arc::new(ObjectAdapter::new("bank", Arc::clone(&registry)));
    adapter.add(Identity::with_category("alice", "accounts"), account(Arc::new(Mutex::new(0))));

    let channel: Arc<dyn Channel> = Arc::new(LoopbackChannel::new(adapter, host.clone()));
    let proxy = Proxy::new(Identity::with_category("alice", "accounts"), channel, Arc::clone(&registry))
        .with_context([("owner".to_string(), "alice".to_string())].into());

    let mut guard = host.enter().await;

    let balance = op("deposit")?.invoke(&mut guard, &proxy, &[Value::Long(100)]).await?;
    info!(?balance, "deposited");

    match op("withdraw")?.invoke(&mut guard, &proxy, &[Value::Long(250)]).await {
        Err(InvokeError::User(ex)) => warn!(shortfall = ?ex.member("shortfall"), "withdrawal refused"),
        other => info!(result = ?other, "withdrawal"),
    }

    let balance = op("withdraw")?.invoke(&mut guard, &proxy, &[Value::Long(40)]).await?;
    info!(?balance, "withdrew");

    let statement = op("statement")?.invoke(&mut guard, &proxy, &[]).await?;
    info!(?statement, "statement");

    op("audit")?
        .invoke(&mut guard, &proxy.clone().oneway(), &[Value::string("end of day")])
        .await?;

    Ok(())
}
