use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use clap::Args;
use policy_facade::{Action, ObjectRef, PartialDecisionResult, PolicyState};
use serde::Serialize;
use tracing::info;

use crate::cli::context::CliContext;
use crate::cli::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct CheckArgs {
    /// Object type, e.g. `dataset`
    pub object_type: String,

    /// Object id
    pub object_id: String,

    /// Also fetch the full policy detail
    #[arg(long)]
    pub detail: bool,
}

#[derive(Args, Clone, Debug)]
pub struct ActionArgs {
    pub object_type: String,

    pub object_id: String,

    /// Action to check (read, download, auth, allocate or a custom name)
    pub action: String,
}

#[derive(Args, Clone, Debug)]
pub struct BatchArgs {
    /// Resources as `type:id`
    #[arg(required = true, value_parser = parse_resource)]
    pub resources: Vec<ObjectRef>,
}

#[derive(Args, Clone, Debug)]
pub struct RefreshArgs {
    pub object_type: String,

    pub object_id: String,
}

fn parse_resource(raw: &str) -> Result<ObjectRef> {
    let (object_type, object_id) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("expected `type:id`, got `{raw}`"))?;
    if object_type.is_empty() || object_id.is_empty() {
        return Err(anyhow!("expected `type:id`, got `{raw}`"));
    }
    Ok(ObjectRef::new(object_id, object_type))
}

pub async fn cmd_check(args: CheckArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let mut options = ctx.config().facade.clone();
    if args.detail {
        options.auto_fetch = true;
    }
    let facade = ctx.facade_with(options);
    let state = facade
        .bind(ObjectRef::new(args.object_id, args.object_type))
        .await;
    emit(output, &state, || print_state(&state))
}

pub async fn cmd_action(args: ActionArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let object = ObjectRef::new(args.object_id, args.object_type);
    let action = Action::from(args.action);
    let options = ctx
        .config()
        .facade
        .clone()
        .with_auto_validate(false)
        .with_auto_fetch(false);
    let facade = ctx.facade_with(options);
    facade.bind(object.clone()).await;
    let allowed = facade.check_specific_action(action.clone()).await;

    #[derive(Serialize)]
    struct ActionVerdict<'a> {
        object: &'a ObjectRef,
        action: &'a Action,
        allowed: bool,
    }
    let verdict = ActionVerdict {
        object: &object,
        action: &action,
        allowed,
    };
    emit(output, &verdict, || {
        let word = if allowed { "allowed" } else { "denied" };
        println!("{object} {action}: {word}");
    })
}

pub async fn cmd_batch(args: BatchArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let facade = ctx.facade();
    let results: BTreeMap<String, PartialDecisionResult> = facade
        .check_batch(&args.resources)
        .await
        .into_iter()
        .collect();
    info!(resources = args.resources.len(), answered = results.len(), "batch check finished");

    emit(output, &results, || {
        if results.is_empty() {
            println!("No decisions returned");
            return;
        }
        for (id, result) in &results {
            println!(
                "{id}: allowed [{}] denied [{}]",
                join(&result.allowed_actions),
                join(&result.denied_actions)
            );
        }
    })
}

pub async fn cmd_refresh(args: RefreshArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let facade = ctx.facade();
    facade
        .bind(ObjectRef::new(args.object_id, args.object_type))
        .await;
    let state = facade.refresh().await;
    emit(output, &state, || print_state(&state))
}

fn join<'a>(actions: impl IntoIterator<Item = &'a Action>) -> String {
    actions
        .into_iter()
        .map(Action::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_state(state: &PolicyState) {
    match (&state.object, &state.subject) {
        (Some(object), Some(subject)) => println!("Object:  {object} (subject {subject})"),
        (Some(object), None) => println!("Object:  {object} (no subject)"),
        _ => println!("Object:  (unbound)"),
    }
    println!("Phase:   {:?}", state.phase);
    println!("Allowed: {}", join(&state.allowed_actions));
    println!("Denied:  {}", join(&state.denied_actions));
    let flags = state.flags();
    println!(
        "Flags:   read={} download={} auth={} allocate={}",
        flags.can_read, flags.can_download, flags.can_auth, flags.can_allocate
    );
    if let Some(info) = &state.policy_info {
        match serde_json::to_string_pretty(info.value()) {
            Ok(rendered) => println!("Policy:\n{rendered}"),
            Err(_) => println!("Policy:  <unprintable>"),
        }
    }
}
