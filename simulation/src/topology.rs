//! Mesh topology definitions
//!
//! A [`Mesh`] lists the links that *may* exist between nodes. Whether a link
//! is actually up on a given tick is decided by the simulation.
//!
//! - Line: A - B - C - ...
//! - Ring: line with the ends joined
//! - Star: A in the centre
//! - Full mesh: every pair
//! - Random: each pair with a given probability
//! - Custom: from an edge list

use std::collections::BTreeSet;

use ferry_core::IdentityError;
use rand::Rng;

use crate::types::PeerId;

/// Potential links between nodes
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    peers: BTreeSet<PeerId>,
    /// Normalised so the smaller identity comes first
    edges: BTreeSet<(PeerId, PeerId)>,
}

/// Order a pair so (A, B) and (B, A) name the same link
pub fn link_key(a: PeerId, b: PeerId) -> (PeerId, PeerId) {
    if a < b { (a, b) } else { (b, a) }
}

impl Mesh {
    /// Create an empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node without links
    pub fn add_peer(&mut self, id: PeerId) {
        self.peers.insert(id);
    }

    /// Add a potential link between two nodes
    pub fn connect(&mut self, a: PeerId, b: PeerId) {
        if a == b {
            return;
        }
        self.peers.insert(a);
        self.peers.insert(b);
        self.edges.insert(link_key(a, b));
    }

    /// Nodes that share a potential link with `peer`
    pub fn neighbors(&self, peer: PeerId) -> Vec<PeerId> {
        self.edges
            .iter()
            .filter_map(|&(a, b)| {
                if a == peer {
                    Some(b)
                } else if b == peer {
                    Some(a)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Check if two nodes share a potential link
    pub fn are_connected(&self, a: PeerId, b: PeerId) -> bool {
        self.edges.contains(&link_key(a, b))
    }

    /// All potential links
    pub fn edges(&self) -> impl Iterator<Item = (PeerId, PeerId)> + '_ {
        self.edges.iter().copied()
    }

    /// All node IDs in order
    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.iter().copied().collect()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Print a simple ASCII visualization of the mesh
    pub fn visualize(&self) -> String {
        let mut output = String::new();
        output.push_str("Mesh Topology:\n");
        output.push_str(&format!("  Peers: {}\n", self.peer_count()));
        output.push_str(&format!("  Edges: {}\n\n", self.edge_count()));

        for peer in &self.peers {
            let neighbors: Vec<String> = self
                .neighbors(*peer)
                .iter()
                .map(|n| n.to_string())
                .collect();
            output.push_str(&format!("  {} -> [{}]\n", peer, neighbors.join(", ")));
        }
        output
    }
}

/// Builder for common topologies over nodes A, B, C, ...
pub struct MeshBuilder {
    peers: Vec<PeerId>,
}

impl MeshBuilder {
    /// Create a builder for `peer_count` nodes (capped at 26)
    pub fn new(peer_count: usize) -> Self {
        Self {
            peers: PeerId::first(peer_count),
        }
    }

    fn empty(&self) -> Mesh {
        let mut mesh = Mesh::new();
        for peer in &self.peers {
            mesh.add_peer(*peer);
        }
        mesh
    }

    /// A - B - C - D - ...
    pub fn line(self) -> Mesh {
        let mut mesh = self.empty();
        for pair in self.peers.windows(2) {
            mesh.connect(pair[0], pair[1]);
        }
        mesh
    }

    /// A - B - C - ... - A
    pub fn ring(self) -> Mesh {
        let mut mesh = self.empty();
        for i in 0..self.peers.len() {
            let next = (i + 1) % self.peers.len();
            mesh.connect(self.peers[i], self.peers[next]);
        }
        mesh
    }

    /// A in the centre, linked to every other node
    pub fn star(self) -> Mesh {
        let mut mesh = self.empty();
        if let Some((center, rest)) = self.peers.split_first() {
            for peer in rest {
                mesh.connect(*center, *peer);
            }
        }
        mesh
    }

    /// Every node linked to every other
    pub fn full_mesh(self) -> Mesh {
        let mut mesh = self.empty();
        for (i, a) in self.peers.iter().enumerate() {
            for b in &self.peers[i + 1..] {
                mesh.connect(*a, *b);
            }
        }
        mesh
    }

    /// Each pair linked with `connection_probability`, using the thread rng
    pub fn random(self, connection_probability: f64) -> Mesh {
        self.random_with(connection_probability, &mut rand::rng())
    }

    /// Each pair linked with `connection_probability`
    ///
    /// Isolated nodes are then tied to their alphabetical neighbour so the
    /// mesh has no node that can never be reached.
    pub fn random_with<R: Rng>(self, connection_probability: f64, rng: &mut R) -> Mesh {
        let mut mesh = self.empty();
        for (i, a) in self.peers.iter().enumerate() {
            for b in &self.peers[i + 1..] {
                if rng.random::<f64>() < connection_probability {
                    mesh.connect(*a, *b);
                }
            }
        }

        for (i, peer) in self.peers.iter().enumerate() {
            if mesh.neighbors(*peer).is_empty() && self.peers.len() > 1 {
                let other = self.peers[(i + 1) % self.peers.len()];
                mesh.connect(*peer, other);
            }
        }
        mesh
    }
}

/// Create a custom mesh from an edge list
pub fn from_edges(edges: &[(char, char)]) -> Result<Mesh, IdentityError> {
    let mut mesh = Mesh::new();
    for (a, b) in edges {
        mesh.connect(parse_peer(*a)?, parse_peer(*b)?);
    }
    Ok(mesh)
}

fn parse_peer(c: char) -> Result<PeerId, IdentityError> {
    PeerId::new(c).ok_or_else(|| IdentityError::InvalidFormat(c.to_string()))
}
