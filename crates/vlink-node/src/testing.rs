// ============================================
// File: crates/vlink-node/src/testing.rs
// ============================================
//! Shared fixtures for unit tests: a controller that signs credentials,
//! an in-memory identity lookup and a dispatcher wired to recording
//! mocks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing_subscriber::EnvFilter;

use vlink_common::time::now_millis;
use vlink_common::types::{Address, NetworkId};
use vlink_core::credential::{
    Capability, CertificateOfMembership, CertificateOfOwnership, CredentialType, IdentityLookup,
    Revocation, Signable, Tag, Thing,
};
use vlink_core::crypto::Identity;
use vlink_core::netconf::NetworkConfig;
use vlink_core::protocol::messages::Hello;
use vlink_core::protocol::version::SOFTWARE_VERSION;
use vlink_core::protocol::{Packet, Verb, CURRENT_PROTOCOL_VERSION};
use vlink_core::rules::Rule;
use vlink_core::wire::WireCodec;
use vlink_transport::mock::{MockPort, MockSender};
use vlink_transport::traits::InboundPath;

use crate::config::NodeConfig;
use crate::handlers::Dispatcher;
use crate::services::{Network, NetworkTable, Peer, RetryQueue, Topology};

/// Identity lookup backed by a map; records WHOIS requests.
#[derive(Default)]
pub(crate) struct StaticLookup {
    identities: RwLock<HashMap<Address, Arc<Identity>>>,
    whois: Mutex<Vec<Address>>,
}

impl StaticLookup {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(identity: &Identity) -> Self {
        let lookup = Self::new();
        lookup.learn(identity);
        lookup
    }

    pub(crate) fn learn(&self, identity: &Identity) {
        self.identities
            .write()
            .insert(identity.address(), Arc::new(identity.to_public()));
    }

    pub(crate) fn whois_requests(&self) -> Vec<Address> {
        self.whois.lock().clone()
    }
}

impl IdentityLookup for StaticLookup {
    fn identity(&self, address: Address) -> Option<Arc<Identity>> {
        self.identities.read().get(&address).cloned()
    }

    fn request_whois(&self, address: Address) {
        self.whois.lock().push(address);
    }
}

/// A network and the controller that signs its credentials.
pub(crate) struct TestNetwork {
    controller: Identity,
    nwid: NetworkId,
}

impl TestNetwork {
    pub(crate) fn new() -> Self {
        let controller = Identity::generate();
        let nwid = NetworkId::from_controller(controller.address(), 0x42);
        Self { controller, nwid }
    }

    pub(crate) fn controller(&self) -> &Identity {
        &self.controller
    }

    pub(crate) fn nwid(&self) -> NetworkId {
        self.nwid
    }

    /// Private network config issued to `member`, with its own signed COM.
    pub(crate) fn config(&self, member: Address, timestamp: i64) -> NetworkConfig {
        let mut conf = NetworkConfig::new(self.nwid, member, timestamp);
        conf.com = Some(self.com(member, timestamp));
        conf
    }

    pub(crate) fn com(&self, member: Address, timestamp: i64) -> CertificateOfMembership {
        self.com_with_delta(
            member,
            timestamp,
            vlink_core::netconf::DEFAULT_CREDENTIAL_TIME_MAX_DELTA.unsigned_abs(),
        )
    }

    pub(crate) fn com_with_delta(
        &self,
        member: Address,
        timestamp: i64,
        max_delta: u64,
    ) -> CertificateOfMembership {
        let mut com = CertificateOfMembership::new(timestamp, max_delta, self.nwid, member);
        com.sign(&self.controller).unwrap();
        com
    }

    pub(crate) fn capability(
        &self,
        id: u32,
        member: Address,
        timestamp: i64,
        rules: Vec<Rule>,
    ) -> Capability {
        let mut cap = Capability::new(id, self.nwid, timestamp, member, rules).unwrap();
        cap.sign(&self.controller).unwrap();
        cap
    }

    pub(crate) fn tag(&self, id: u32, value: u32, member: Address, timestamp: i64) -> Tag {
        let mut tag = Tag::new(id, value, self.nwid, timestamp, member);
        tag.sign(&self.controller).unwrap();
        tag
    }

    pub(crate) fn coo(
        &self,
        id: u32,
        member: Address,
        timestamp: i64,
        thing: Thing,
    ) -> CertificateOfOwnership {
        let mut coo = CertificateOfOwnership::new(id, self.nwid, timestamp, member);
        coo.add_thing(thing).unwrap();
        coo.sign(&self.controller).unwrap();
        coo
    }

    pub(crate) fn revocation(
        &self,
        id: u32,
        kind: CredentialType,
        credential_id: u32,
        threshold: i64,
        target: Address,
    ) -> Revocation {
        let mut rev = Revocation::new(id, self.nwid, kind, credential_id, threshold, target);
        rev.sign(&self.controller).unwrap();
        rev
    }
}

/// Installs a test-writer subscriber once per test binary. `RUST_LOG`
/// overrides the default `warn` level.
pub(crate) fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A dispatcher for a fresh local identity, wired to recording mocks.
pub(crate) struct Harness {
    pub(crate) local: Arc<Identity>,
    pub(crate) config: Arc<NodeConfig>,
    pub(crate) topology: Arc<Topology>,
    pub(crate) networks: Arc<NetworkTable>,
    pub(crate) retry: Arc<RetryQueue>,
    pub(crate) sender: Arc<MockSender>,
    pub(crate) port: Arc<MockPort>,
    pub(crate) dispatcher: Dispatcher,
    packet_ids: AtomicU64,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with(NodeConfig::default())
    }

    pub(crate) fn with_config(toml: &str) -> Self {
        Self::with(NodeConfig::from_str(toml).unwrap())
    }

    pub(crate) fn with(config: NodeConfig) -> Self {
        init_tracing();
        let local = Arc::new(Identity::generate());
        let config = Arc::new(config);
        let sender = Arc::new(MockSender::new());
        let port = Arc::new(MockPort::new());
        let topology = Arc::new(Topology::new(
            Arc::clone(&local),
            sender.clone(),
            config.node.upstream_address(),
            config.limits.whois_retry_ms,
        ));
        let networks = Arc::new(NetworkTable::new());
        let retry = Arc::new(RetryQueue::new(
            config.limits.retry_queue_per_address,
            config.limits.retry_queue_max_total,
            config.limits.deferred_ttl_ms,
        ));
        let dispatcher = Dispatcher::new(
            Arc::clone(&config),
            Arc::clone(&topology),
            Arc::clone(&networks),
            Arc::clone(&retry),
            sender.clone(),
            port.clone(),
        );
        Self {
            local,
            config,
            topology,
            networks,
            retry,
            sender,
            port,
            dispatcher,
            packet_ids: AtomicU64::new(1),
        }
    }

    pub(crate) fn remote(&self) -> Identity {
        Identity::generate()
    }

    pub(crate) fn learn(&self, identity: &Identity) -> Arc<Peer> {
        let added = self.topology.add_peer(identity.to_public()).unwrap();
        Arc::clone(added.peer().unwrap())
    }

    pub(crate) fn path(&self) -> InboundPath {
        InboundPath::new("203.0.113.7:9993".parse().unwrap())
    }

    /// Joins `net` with a config issued to this node now.
    pub(crate) fn join(&self, net: &TestNetwork) -> Arc<Network> {
        self.join_config(net.config(self.local.address(), now_millis()))
    }

    pub(crate) fn join_config(&self, conf: NetworkConfig) -> Arc<Network> {
        let nwid = conf.nwid;
        let network = Arc::new(
            Network::new(
                conf,
                self.local.address(),
                self.config.node.authoritative,
                self.config.limits.multicast_like_ttl_ms,
            )
            .unwrap(),
        );
        self.networks.insert(nwid, Arc::clone(&network));
        network
    }

    /// A packet from `remote` to this node, armored with their shared key.
    pub(crate) fn packet_from(
        &self,
        remote: &Identity,
        verb: Verb,
        payload: &[u8],
        encrypt: bool,
    ) -> Bytes {
        let id = self.packet_ids.fetch_add(1, Ordering::Relaxed);
        let mut packet = Packet::new(id, self.local.address(), remote.address(), verb);
        packet.append_payload(payload).unwrap();
        packet.armor(&remote.agree(&self.local).unwrap(), encrypt);
        packet.freeze()
    }

    pub(crate) fn hello_from(&self, remote: &Identity) -> Bytes {
        let hello = Hello {
            protocol_version: CURRENT_PROTOCOL_VERSION,
            software: SOFTWARE_VERSION,
            timestamp: 1234,
            identity: remote.to_public(),
        };
        self.packet_from(remote, Verb::Hello, &hello.to_bytes(), false)
    }
}
