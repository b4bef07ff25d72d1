//! Frame graph compilation.
//!
//! This module turns the declarations of a [`FrameGraph`](crate::graph::FrameGraph)
//! into an execution plan ([`CompiledGraph`]).
//!
//! # Stages
//!
//! 1. **Edges** - Producer of each read version → reader. A reader registered
//!    before its producer is rejected ([`GraphError::VersionOrder`]).
//! 2. **Culling** - Reference counting over versions and passes. Versions
//!    nobody reads release their producer; a producer left without readers
//!    is culled and releases its own reads in turn. Final versions of
//!    imported and exported resources count as read from outside.
//! 3. **Ordering** - Kahn's algorithm over the kept passes with registration
//!    order as tie-break, so the result is stable. A leftover node means a
//!    cycle ([`GraphError::CyclicDependency`]).
//! 4. **Lifetimes** - First and last position each resource is used at, the
//!    number of kept uses and the state of its first use.
//! 5. **State planning** - Per kept pass, the merged state each accessed
//!    resource must be in.
//!
//! # Example
//!
//! ```ignore
//! graph.add_graphics_pass("depth", |b| { /* writes Depth */ })?;
//! graph.add_graphics_pass("unused", |b| { /* writes Unused, nobody reads */ })?;
//! graph.add_graphics_pass("forward", |b| { /* reads Depth, writes Backbuffer */ })?;
//!
//! let compiled = graph.build()?;
//! assert_eq!(compiled.pass_order(), &[depth, forward]);
//! assert!(compiled.is_culled(unused));
//! ```

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::barrier::ResourceState;
use crate::error::GraphError;
use crate::graph::{
    FrameGraphConfig, PassDeclaration, PassFlags, PassHandle, ResourceHandle, ResourceRegistry,
};

/// The merged state one pass needs for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateRequest {
    /// The accessed resource.
    pub resource: ResourceHandle,
    /// Required state (union of all read states if the pass reads it twice).
    pub state: ResourceState,
}

/// Usage span of a resource over the execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLifetime {
    /// Position of the first kept pass using the resource.
    pub first: usize,
    /// Position of the last kept pass using the resource.
    pub last: usize,
    /// Number of kept passes using the resource.
    pub uses: u32,
    /// State required by the first use.
    pub first_state: ResourceState,
    /// Keep the physical resource until the frame ends (exports, or aliasing off).
    pub held_until_end: bool,
}

/// A compiled frame graph ready for execution.
///
/// Contains the stable topological order of the kept passes plus everything
/// the executor needs to bind resources and emit barriers.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CompiledGraph {
    /// Kept passes in execution order.
    pass_order: Vec<PassHandle>,
    /// Culled passes in registration order.
    culled: Vec<PassHandle>,
    /// Position of each registered pass in `pass_order`.
    positions: Vec<Option<usize>>,
    /// Dependency edges between kept passes as (dependency, dependent).
    edges: Vec<(PassHandle, PassHandle)>,
    /// Per resource, its lifetime if a kept pass uses it.
    lifetimes: Vec<Option<ResourceLifetime>>,
    /// Per registered pass, its merged state requests.
    pass_states: Vec<Vec<StateRequest>>,
    /// Declared reads per (resource, version), before culling.
    reader_counts: HashMap<(ResourceHandle, u32), u32>,
}

impl CompiledGraph {
    /// Kept passes in execution order.
    pub fn pass_order(&self) -> &[PassHandle] {
        &self.pass_order
    }

    /// Passes removed by culling.
    pub fn culled(&self) -> &[PassHandle] {
        &self.culled
    }

    /// Check whether a pass was culled.
    pub fn is_culled(&self, pass: PassHandle) -> bool {
        self.culled.contains(&pass)
    }

    /// Position of a kept pass in the execution order.
    pub fn position(&self, pass: PassHandle) -> Option<usize> {
        self.positions.get(pass.index()).copied().flatten()
    }

    /// Usage span of a resource, if any kept pass uses it.
    pub fn lifetime(&self, resource: ResourceHandle) -> Option<&ResourceLifetime> {
        self.lifetimes.get(resource.index()).and_then(Option::as_ref)
    }

    /// Merged state requests of a pass. Empty for culled passes.
    pub fn pass_states(&self, pass: PassHandle) -> &[StateRequest] {
        self.pass_states
            .get(pass.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Kept passes that `pass` depends on.
    pub fn dependencies(&self, pass: PassHandle) -> impl Iterator<Item = PassHandle> + '_ {
        self.edges
            .iter()
            .filter(move |&&(_, dependent)| dependent == pass)
            .map(|&(dependency, _)| dependency)
    }

    /// All dependency edges between kept passes as (dependency, dependent).
    pub fn edges(&self) -> &[(PassHandle, PassHandle)] {
        &self.edges
    }

    /// Number of declared reads of `version` of `resource`, before culling.
    pub fn reader_count(&self, resource: ResourceHandle, version: u32) -> u32 {
        self.reader_counts
            .get(&(resource, version))
            .copied()
            .unwrap_or(0)
    }

    /// Highest number of pooled transients alive at the same time.
    ///
    /// `registry` must be the registry the graph was compiled from; imported
    /// resources are not pooled and do not count.
    pub fn max_concurrent_transients(&self, registry: &ResourceRegistry) -> usize {
        let end = self.pass_order.len().saturating_sub(1);
        let mut live = vec![0i64; self.pass_order.len() + 1];
        for (handle, resource) in registry.iter() {
            if resource.is_imported() {
                continue;
            }
            let Some(lifetime) = self.lifetime(handle) else {
                continue;
            };
            let last = if lifetime.held_until_end {
                end
            } else {
                lifetime.last
            };
            live[lifetime.first] += 1;
            live[last + 1] -= 1;
        }

        let mut current = 0i64;
        let mut peak = 0i64;
        for delta in live {
            current += delta;
            peak = peak.max(current);
        }
        peak as usize
    }

    /// Get the number of kept passes.
    pub fn pass_count(&self) -> usize {
        self.pass_order.len()
    }

    /// Check if no pass survived.
    pub fn is_empty(&self) -> bool {
        self.pass_order.is_empty()
    }
}

/// Compile pass declarations into an execution plan.
///
/// `passes` must be indexed by pass handle (registration order).
pub fn compile(
    passes: &[&PassDeclaration],
    registry: &ResourceRegistry,
    config: &FrameGraphConfig,
) -> Result<CompiledGraph, GraphError> {
    let n = passes.len();
    let mut result = CompiledGraph {
        positions: vec![None; n],
        lifetimes: vec![None; registry.len()],
        pass_states: vec![Vec::new(); n],
        ..Default::default()
    };

    // Version reference counts, indexed [resource][version].
    let mut version_refs: Vec<Vec<u32>> = registry
        .iter()
        .map(|(_, resource)| vec![0u32; resource.version() as usize + 1])
        .collect();
    let mut edges: Vec<(PassHandle, PassHandle)> = Vec::new();

    for (index, pass) in passes.iter().enumerate() {
        let handle = PassHandle::new(index as u32);
        for access in pass.reads() {
            let Some(version) = access.read_version else {
                continue;
            };
            let resource = registry.resource(access.resource)?;
            let refs = version_refs
                .get_mut(access.resource.index())
                .and_then(|refs| refs.get_mut(version as usize))
                .ok_or(GraphError::InvalidResourceHandle(access.resource))?;
            *refs += 1;

            if let Some(producer) = resource.producer(version) {
                if producer.index() >= index {
                    return Err(GraphError::VersionOrder {
                        name: resource.name().clone(),
                        version,
                        writer: passes
                            .get(producer.index())
                            .map(|p| p.name.clone())
                            .unwrap_or_default(),
                        reader: pass.name.clone(),
                    });
                }
                if !edges.contains(&(producer, handle)) {
                    edges.push((producer, handle));
                }
            }
        }
    }

    for (handle, _) in registry.iter() {
        for (version, &count) in version_refs[handle.index()].iter().enumerate() {
            if count > 0 {
                result.reader_counts.insert((handle, version as u32), count);
            }
        }
    }

    // Final versions of imported and exported resources are read from outside.
    for (handle, resource) in registry.iter() {
        if resource.is_imported() || resource.is_exported() {
            version_refs[handle.index()][resource.version() as usize] += 1;
        }
    }

    let culled = if config.culling {
        cull(passes, registry, config, &mut version_refs)
    } else {
        vec![false; n]
    };

    // Stable Kahn over the kept passes.
    let kept_edges: Vec<(PassHandle, PassHandle)> = edges
        .into_iter()
        .filter(|&(from, to)| !culled[from.index()] && !culled[to.index()])
        .collect();
    let mut in_degree = vec![0u32; n];
    let mut dependents: Vec<Vec<PassHandle>> = vec![Vec::new(); n];
    for &(dependency, dependent) in &kept_edges {
        in_degree[dependent.index()] += 1;
        dependents[dependency.index()].push(dependent);
    }

    let mut ready: BinaryHeap<Reverse<PassHandle>> = (0..n as u32)
        .map(PassHandle::new)
        .filter(|&h| !culled[h.index()] && in_degree[h.index()] == 0)
        .map(Reverse)
        .collect();

    while let Some(Reverse(handle)) = ready.pop() {
        result.positions[handle.index()] = Some(result.pass_order.len());
        result.pass_order.push(handle);

        for &dependent in &dependents[handle.index()] {
            in_degree[dependent.index()] -= 1;
            if in_degree[dependent.index()] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    let kept_count = culled.iter().filter(|&&c| !c).count();
    if result.pass_order.len() != kept_count {
        return Err(GraphError::CyclicDependency);
    }

    result.culled = (0..n as u32)
        .map(PassHandle::new)
        .filter(|h| culled[h.index()])
        .collect();
    result.edges = kept_edges;

    // Merged states and lifetimes, walking the execution order.
    for (position, &handle) in result.pass_order.iter().enumerate() {
        let pass = passes[handle.index()];
        let states = &mut result.pass_states[handle.index()];

        for access in pass.accesses() {
            let Some(state) = access.state() else {
                continue;
            };
            match states.iter_mut().find(|r| r.resource == access.resource) {
                Some(request) => request.state |= state,
                None => states.push(StateRequest {
                    resource: access.resource,
                    state,
                }),
            }
        }

        for request in states.iter() {
            let resource = registry.resource(request.resource)?;
            let held_until_end = resource.is_exported() || !config.aliasing;
            let lifetime = result.lifetimes[request.resource.index()].get_or_insert(
                ResourceLifetime {
                    first: position,
                    last: position,
                    uses: 0,
                    first_state: request.state,
                    held_until_end,
                },
            );
            lifetime.last = position;
            lifetime.uses += 1;
        }
    }

    Ok(result)
}

/// Reference-count culling. Returns the culled flag per pass.
fn cull(
    passes: &[&PassDeclaration],
    registry: &ResourceRegistry,
    config: &FrameGraphConfig,
    version_refs: &mut [Vec<u32>],
) -> Vec<bool> {
    let n = passes.len();
    let mut culled = vec![false; n];
    let mut pass_refs: Vec<u32> = passes
        .iter()
        .map(|pass| pass.writes().count() as u32)
        .collect();
    let cullable =
        |pass: &PassDeclaration| !pass.flags.contains(PassFlags::FORCE_NO_CULL);

    let mut stack: Vec<(ResourceHandle, u32)> = Vec::new();
    for (handle, resource) in registry.iter() {
        for version in 1..=resource.version() {
            if version_refs[handle.index()][version as usize] == 0 {
                stack.push((handle, version));
            }
        }
    }

    let release_reads = |pass: &PassDeclaration,
                         version_refs: &mut [Vec<u32>],
                         stack: &mut Vec<(ResourceHandle, u32)>| {
        for access in pass.reads() {
            let Some(version) = access.read_version else {
                continue;
            };
            let refs = &mut version_refs[access.resource.index()][version as usize];
            *refs = refs.saturating_sub(1);
            if *refs == 0 && version > 0 {
                stack.push((access.resource, version));
            }
        }
    };

    // Passes without writes only run for their side effects.
    if config.cull_side_effect_passes {
        for (index, pass) in passes.iter().enumerate() {
            if pass.has_no_outputs() && cullable(*pass) {
                culled[index] = true;
                release_reads(*pass, &mut *version_refs, &mut stack);
            }
        }
    }

    while let Some((resource, version)) = stack.pop() {
        let Some(producer) = registry
            .get(resource)
            .and_then(|logical| logical.producer(version))
        else {
            continue;
        };
        let index = producer.index();
        if culled[index] {
            continue;
        }
        pass_refs[index] = pass_refs[index].saturating_sub(1);
        if pass_refs[index] == 0 && cullable(passes[index]) {
            log::trace!("compiler: culling `{}`", passes[index].name);
            culled[index] = true;
            release_reads(passes[index], &mut *version_refs, &mut stack);
        }
    }

    culled
}
