//! Forwarding strategy hook. See spec §1 ("strategy implementations ...
//! plug-in collaborators"), §4.7.

use crate::face::FaceId;
use crate::fib::NextHop;
use crate::packet::Interest;

/// Implemented by forwarding strategies, which decide which FIB next hops
/// a newly-arrived Interest should be sent out on. The core only invokes
/// this for genuinely new PIT entries (spec §4.7 step 6); strategies must
/// not block (spec §5).
pub trait Strategy {
    fn after_receive_new_interest(
        &mut self,
        interest: &Interest,
        incoming_face: FaceId,
        next_hops: &[NextHop],
    ) -> Vec<FaceId>;
}

/// Forwards to every FIB next hop other than the one the Interest arrived
/// on -- the minimal strategy needed to exercise the forwarding core
/// independently of any specific strategy implementation (spec §4.7).
#[derive(Default)]
pub struct MulticastStrategy;

impl Strategy for MulticastStrategy {
    fn after_receive_new_interest(
        &mut self,
        _interest: &Interest,
        incoming_face: FaceId,
        next_hops: &[NextHop],
    ) -> Vec<FaceId> {
        next_hops
            .iter()
            .map(|nh| nh.face)
            .filter(|&face| face != incoming_face)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Name;
    use crate::packet::Selectors;

    #[test]
    fn multicast_excludes_incoming_face() {
        let interest = Interest {
            name: Name::parse_uri("/a").unwrap(),
            can_be_prefix: false,
            must_be_fresh: false,
            selectors: Selectors::default(),
            nonce: [0; 4],
            interest_lifetime_ms: None,
            hop_limit: None,
        };
        let hops = vec![
            NextHop { face: FaceId::new(1), cost: 1 },
            NextHop { face: FaceId::new(2), cost: 1 },
        ];
        let mut strategy = MulticastStrategy;
        let chosen = strategy.after_receive_new_interest(&interest, FaceId::new(1), &hops);
        assert_eq!(chosen, vec![FaceId::new(2)]);
    }
}
