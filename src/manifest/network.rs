//! This module contains the networks that manifests are named after.

use std::fmt::{Display, Formatter};

/// A representation of the chain on which a contract is deployed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Network {
    /// Ethereum main-net.
    Mainnet,
    Ropsten,
    Rinkeby,
    Goerli,
    Kovan,
    Sepolia,
    Holesky,

    /// Any other chain, known only by its id.
    Unknown(u64),
}

impl Network {
    /// Gets the network with the provided `chain_id`.
    #[must_use]
    pub fn from_chain_id(chain_id: u64) -> Self {
        match chain_id {
            1 => Self::Mainnet,
            3 => Self::Ropsten,
            4 => Self::Rinkeby,
            5 => Self::Goerli,
            42 => Self::Kovan,
            11_155_111 => Self::Sepolia,
            17_000 => Self::Holesky,
            other => Self::Unknown(other),
        }
    }

    /// Gets the chain id of the network.
    #[must_use]
    pub fn chain_id(self) -> u64 {
        match self {
            Self::Mainnet => 1,
            Self::Ropsten => 3,
            Self::Rinkeby => 4,
            Self::Goerli => 5,
            Self::Kovan => 42,
            Self::Sepolia => 11_155_111,
            Self::Holesky => 17_000,
            Self::Unknown(id) => id,
        }
    }
}

/// Displays the name used for the network's manifest file.
impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Mainnet => "mainnet",
            Self::Ropsten => "ropsten",
            Self::Rinkeby => "rinkeby",
            Self::Goerli => "goerli",
            Self::Kovan => "kovan",
            Self::Sepolia => "sepolia",
            Self::Holesky => "holesky",
            Self::Unknown(id) => return write!(f, "unknown-{id}"),
        };
        write!(f, "{name}")
    }
}

impl From<u64> for Network {
    fn from(chain_id: u64) -> Self {
        Self::from_chain_id(chain_id)
    }
}

#[cfg(test)]
mod tests {
    use crate::manifest::network::Network;

    #[test]
    fn names_known_networks() {
        assert_eq!(Network::from_chain_id(1).to_string(), "mainnet");
        assert_eq!(Network::from_chain_id(11_155_111).to_string(), "sepolia");
        assert_eq!(Network::Goerli.chain_id(), 5);
    }

    #[test]
    fn names_unknown_networks_by_id() {
        let network = Network::from(31_337);
        assert_eq!(network, Network::Unknown(31_337));
        assert_eq!(network.to_string(), "unknown-31337");
        assert_eq!(network.chain_id(), 31_337);
    }
}
