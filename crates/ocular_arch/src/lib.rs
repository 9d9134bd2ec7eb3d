//! Routing-fabric architecture interface for the OCuLaR router.
//!
//! This crate provides the [`RoutingContext`] trait that abstracts over the
//! architecture backend feeding the router: the set of routable wires, the
//! directed PIP edges between them, their delays, the nets to route, and the
//! bind/unbind surface the router commits its results through. A concrete
//! in-memory implementation, [`FabricModel`], is provided for tests and for
//! small flows that build their fabric programmatically.
//!
//! # Usage
//!
//! ```
//! use ocular_arch::{FabricModel, RoutingContext};
//!
//! let fabric = FabricModel::mesh(4, 4);
//! assert_eq!(fabric.grid_dim(), (4, 4));
//! assert_eq!(fabric.wires().len(), 16);
//! ```

#![warn(missing_docs)]

pub mod fabric;
pub mod ids;
pub mod types;

pub use fabric::{ArchError, FabricModel};
pub use ids::{NetId, PipId, WireId};
pub use types::{BindStrength, Delay, Loc, Rect};

/// The architecture context consumed by the router core.
///
/// Implementations expose a static routing graph (wires and directed PIPs
/// with delays), the nets to connect, and the binding surface through which
/// the router commits or releases routing. All graph queries must be
/// deterministic: [`wires`](RoutingContext::wires) and
/// [`nets`](RoutingContext::nets) return entities in a stable order, and
/// [`downhill_pips`](RoutingContext::downhill_pips) preserves its order
/// across calls. The router treats the context as a single-threaded
/// resource, accessed only between kernel launches.
pub trait RoutingContext: std::fmt::Debug {
    // --- Grid and wires ---

    /// Returns the device grid dimensions as (width, height).
    fn grid_dim(&self) -> (u16, u16);

    /// Returns all routable wires in deterministic order.
    fn wires(&self) -> Vec<WireId>;

    /// Returns the bounding rectangle of a wire; the router uses its
    /// midpoint as the wire's centroid for admission hit-testing.
    fn wire_bbox(&self, wire: WireId) -> Rect;

    /// Returns whether the wire is available for general routing.
    fn wire_avail(&self, wire: WireId) -> bool;

    /// Returns the delay along the wire segment.
    fn wire_delay(&self, wire: WireId) -> Delay;

    // --- PIPs ---

    /// Returns the PIPs whose source is the given wire, in deterministic order.
    fn downhill_pips(&self, wire: WireId) -> Vec<PipId>;

    /// Returns whether the PIP is available for general routing.
    fn pip_avail(&self, pip: PipId) -> bool;

    /// Returns the destination wire the PIP drives.
    fn pip_dst(&self, pip: PipId) -> WireId;

    /// Returns the delay through the PIP when enabled.
    fn pip_delay(&self, pip: PipId) -> Delay;

    // --- Nets ---

    /// Returns all nets in deterministic order.
    fn nets(&self) -> Vec<NetId>;

    /// Returns the display name of a net (used in diagnostics).
    fn net_name(&self, net: NetId) -> &str;

    /// Returns the wire driven by the net's source pin, or `None` if the
    /// net has no driver.
    fn net_driver_wire(&self, net: NetId) -> Option<WireId>;

    /// Returns the wire expected at each sink pin of the net.
    fn net_sink_wires(&self, net: NetId) -> Vec<WireId>;

    /// Returns the wires currently bound to the net together with their
    /// binding strength (pre-existing routing, e.g. global clocks).
    fn net_bound_wires(&self, net: NetId) -> Vec<(WireId, BindStrength)>;

    // --- Binding surface ---

    /// Binds a wire to a net at the given strength.
    fn bind_wire(&mut self, wire: WireId, net: NetId, strength: BindStrength);

    /// Binds a PIP to a net at the given strength.
    fn bind_pip(&mut self, pip: PipId, net: NetId, strength: BindStrength);

    /// Releases every wire and PIP bound to the net.
    fn ripup_net(&mut self, net: NetId);
}
