// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Provider-side upkeep of sub-groups.
//!
//! These helpers are the only place where sub-group bookkeeping and provider
//! calls meet. Validation and item-add failures never abort: a failed batch
//! marks every tag in it as rejected with the batch's code. Failures of
//! group-level operations (creating, advising, removing) are returned as
//! provider errors named after the operation.

use tracing::{debug, warn};

use crate::error::{GatewayError, GatewayResult, Operation};
use crate::provider::{event_channel, ClientHandle, PointProvider, E_FAIL, S_OK};
use crate::registry::{GroupRegistry, SubGroup};
use crate::trace::{join, Tracer};

/// Creates a provider subscription and its empty sub-group.
pub(crate) async fn create_sub_group(
    provider: &mut dyn PointProvider,
    tracer: &Tracer,
    name: Option<String>,
    update_rate: i32,
) -> GatewayResult<SubGroup> {
    tracer.emit(Operation::AddGroup, name.as_deref().unwrap_or(""));
    let handle = provider
        .create_subscription(name.as_deref(), update_rate)
        .await
        .map_err(|f| GatewayError::provider_fault(Operation::AddGroup.as_str(), &f))?;

    Ok(SubGroup::new(name.unwrap_or_default(), handle))
}

/// Validates and adds `tags`, returning the ones the provider accepted.
///
/// Rejected tags keep their status code in the sub-group so a later read
/// can report it.
pub(crate) async fn add_items(
    provider: &mut dyn PointProvider,
    tracer: &Tracer,
    sub: &mut SubGroup,
    tags: &[String],
) -> Vec<String> {
    if tags.is_empty() {
        return Vec::new();
    }

    tracer.emit(Operation::Validate, join(tags));
    let codes = match provider.validate(tags).await {
        Ok(codes) => codes,
        Err(fault) => {
            debug!(sub_group = %sub.name, code = fault.code, "Validate failed: {fault}");
            vec![fault.code; tags.len()]
        }
    };

    let mut candidates = Vec::new();
    let mut clients = Vec::new();
    let mut next = sub.next_client_handle();
    for (i, tag) in tags.iter().enumerate() {
        match codes.get(i).copied().unwrap_or(E_FAIL) {
            S_OK => {
                sub.tags_by_client_handle.insert(next, tag.clone());
                candidates.push(tag.clone());
                clients.push(next);
                next = ClientHandle(next.0 + 1);
            }
            code => sub.reject(tag, code, None),
        }
    }

    if candidates.is_empty() {
        return Vec::new();
    }

    tracer.emit(Operation::AddItems, join(&candidates));
    let results = match provider.add_items(sub.handle, &candidates, &clients).await {
        Ok(results) => results,
        Err(fault) => {
            debug!(sub_group = %sub.name, code = fault.code, "AddItems failed: {fault}");
            vec![(fault.code, None); candidates.len()]
        }
    };

    let mut accepted = Vec::with_capacity(candidates.len());
    for (i, (tag, client)) in candidates.iter().zip(&clients).enumerate() {
        match results.get(i) {
            Some((S_OK, Some(server))) => {
                sub.accept(tag, *server);
                accepted.push(tag.clone());
            }
            Some((code, _)) if *code != S_OK => sub.reject(tag, *code, Some(*client)),
            _ => sub.reject(tag, E_FAIL, Some(*client)),
        }
    }
    accepted
}

/// Removes accepted tags from a sub-group.
pub(crate) async fn remove_items(
    provider: &mut dyn PointProvider,
    tracer: &Tracer,
    sub: &mut SubGroup,
    tags: &[String],
) -> GatewayResult<()> {
    let (tags, handles): (Vec<String>, Vec<_>) = tags
        .iter()
        .filter_map(|tag| sub.server_handle(tag).map(|h| (tag.clone(), h)))
        .unzip();
    if handles.is_empty() {
        return Ok(());
    }

    tracer.emit(Operation::RemoveItems, join(&tags));
    provider
        .remove_items(sub.handle, &handles)
        .await
        .map_err(|f| GatewayError::provider_fault(Operation::RemoveItems.as_str(), &f))?;

    for tag in &tags {
        sub.forget(tag);
    }
    Ok(())
}

/// Attaches an event hook unless one is already attached.
pub(crate) async fn ensure_hook(
    provider: &mut dyn PointProvider,
    tracer: &Tracer,
    sub: &mut SubGroup,
) -> GatewayResult<()> {
    if sub.hook.is_some() {
        return Ok(());
    }

    let (sink, hook) = event_channel(sub.name.clone());
    tracer.emit(Operation::WithEvents, &sub.name);
    provider
        .advise(sub.handle, sink)
        .await
        .map_err(|f| GatewayError::provider_fault(Operation::WithEvents.as_str(), &f))?;
    sub.hook = Some(hook);
    Ok(())
}

/// Closes a sub-group's hook and deletes its provider subscription.
pub(crate) async fn teardown(
    provider: &mut dyn PointProvider,
    tracer: &Tracer,
    mut sub: SubGroup,
) -> GatewayResult<()> {
    if let Some(mut hook) = sub.hook.take() {
        tracer.emit(Operation::CloseEvents, &sub.name);
        if let Err(fault) = provider.unadvise(sub.handle).await {
            debug!(sub_group = %sub.name, "CloseEvents failed: {fault}");
        }
        hook.close();
    }

    tracer.emit(Operation::RemoveGroup, &sub.name);
    provider
        .remove_subscription(sub.handle)
        .await
        .map_err(|f| GatewayError::provider_fault(Operation::RemoveGroup.as_str(), &f))
}

/// Removes a named group and all of its sub-groups.
///
/// Returns `false` for an unknown group. The group leaves the registry
/// before teardown starts, so a provider failure part-way through leaves
/// the remaining subscriptions orphaned on the provider side.
pub(crate) async fn remove_group(
    provider: &mut dyn PointProvider,
    tracer: &Tracer,
    registry: &mut GroupRegistry,
    group: &str,
) -> GatewayResult<bool> {
    let Some(entry) = registry.take(group) else {
        return Ok(false);
    };

    let mut deleted = false;
    for sub in entry.into_sub_groups() {
        teardown(provider, tracer, sub).await?;
        deleted = true;
    }
    debug!(group, deleted, "Group removed");
    Ok(deleted)
}

/// Unregisters a group and tears down every sub-group it holds.
///
/// Teardown failures are logged and do not stop the remaining sub-groups.
pub(crate) async fn discard_group(
    provider: &mut dyn PointProvider,
    tracer: &Tracer,
    registry: &mut GroupRegistry,
    group: &str,
) {
    let Some(entry) = registry.take(group) else {
        return;
    };

    for sub in entry.into_sub_groups() {
        let name = sub.name.clone();
        if let Err(error) = teardown(provider, tracer, sub).await {
            warn!(group, sub_group = %name, "Sub-group teardown failed: {error}");
        }
    }
    debug!(group, "Group discarded");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderFault;
    use crate::provider::memory::SIMULATION_SERVER;
    use crate::provider::{MemoryProvider, OPC_E_UNKNOWNITEMID};

    async fn provider() -> (MemoryProvider, MemoryProvider) {
        let handle = MemoryProvider::simulation();
        let mut provider = handle.clone();
        provider.connect(SIMULATION_SERVER, "localhost").await.unwrap();
        (handle, provider)
    }

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_add_items_rejects_unknown() {
        let (_, mut provider) = provider().await;
        let tracer = Tracer::new();
        let mut sub = create_sub_group(&mut provider, &tracer, Some("G.0".into()), -1)
            .await
            .unwrap();

        let accepted = add_items(
            &mut provider,
            &tracer,
            &mut sub,
            &tags(&["Random.Int4", "Bogus", "Random.Real8"]),
        )
        .await;

        assert_eq!(accepted, tags(&["Random.Int4", "Random.Real8"]));
        assert_eq!(sub.rejection("Bogus"), Some(OPC_E_UNKNOWNITEMID));
        assert_eq!(sub.tag_for(ClientHandle(0)), Some("Random.Int4"));
        assert_eq!(sub.tag_for(ClientHandle(1)), Some("Random.Real8"));
        assert!(sub.is_consistent());
    }

    #[tokio::test]
    async fn test_validate_fault_rejects_batch() {
        let (handle, mut provider) = provider().await;
        handle.fail(Operation::Validate, ProviderFault::new(E_FAIL));
        let tracer = Tracer::new();
        let mut sub = create_sub_group(&mut provider, &tracer, None, -1).await.unwrap();

        let accepted = add_items(&mut provider, &tracer, &mut sub, &tags(&["Random.Int4"])).await;
        assert!(accepted.is_empty());
        assert_eq!(sub.rejection("Random.Int4"), Some(E_FAIL));
        assert_eq!(handle.calls(Operation::AddItems), 0);
    }

    #[tokio::test]
    async fn test_remove_items_fault_is_error() {
        let (handle, mut provider) = provider().await;
        let tracer = Tracer::new();
        let mut sub = create_sub_group(&mut provider, &tracer, None, -1).await.unwrap();
        add_items(&mut provider, &tracer, &mut sub, &tags(&["Random.Int4"])).await;

        handle.fail(
            Operation::RemoveItems,
            ProviderFault::new(E_FAIL).with_provider_message("busy"),
        );
        let err = remove_items(&mut provider, &tracer, &mut sub, &tags(&["Random.Int4"]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "RemoveItems: busy");
        assert_eq!(sub.valid(), &tags(&["Random.Int4"])[..]);
    }

    #[tokio::test]
    async fn test_teardown_removes_subscription() {
        let (handle, mut provider) = provider().await;
        let tracer = Tracer::new();
        let mut sub = create_sub_group(&mut provider, &tracer, Some("G.0".into()), -1)
            .await
            .unwrap();
        ensure_hook(&mut provider, &tracer, &mut sub).await.unwrap();
        assert!(handle.is_advised("G.0"));

        teardown(&mut provider, &tracer, sub).await.unwrap();
        assert_eq!(handle.group_count(), 0);
        assert_eq!(handle.calls(Operation::CloseEvents), 1);
    }

    #[tokio::test]
    async fn test_discard_group_continues_past_failures() {
        let (handle, mut provider) = provider().await;
        let tracer = Tracer::new();
        let mut registry = GroupRegistry::new();
        let live = create_sub_group(&mut provider, &tracer, Some("G.1".into()), -1)
            .await
            .unwrap();
        registry.store("G", 0, SubGroup::new("G.0", crate::provider::GroupHandle(999)));
        registry.store("G", 1, live);

        discard_group(&mut provider, &tracer, &mut registry, "G").await;
        assert!(!registry.contains("G"));
        assert_eq!(handle.group_count(), 0);
        assert_eq!(handle.calls(Operation::RemoveGroup), 2);
    }

    #[tokio::test]
    async fn test_remove_unknown_group() {
        let (_, mut provider) = provider().await;
        let mut registry = GroupRegistry::new();
        let removed = remove_group(&mut provider, &Tracer::new(), &mut registry, "nope")
            .await
            .unwrap();
        assert!(!removed);
    }
}
