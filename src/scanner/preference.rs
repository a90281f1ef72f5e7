// Server preference classification
//
// Two rounds over the same suites: first in numerical order, then in the
// reverse of the prefix the first round managed to enumerate. Comparing the
// orders the server picked in each round tells who drives the choice.

use super::suites::SuiteSelection;

/// Reverse of the first `n` suites of `supported`
pub fn reversed_prefix(supported: &[u16], n: usize) -> Vec<u16> {
    supported[..n.min(supported.len())].iter().rev().copied().collect()
}

/// Classify from the order picked in each round. A server picking the same
/// order both times enforces its own preferences; one picking exactly what
/// was offered in the second round follows the client.
pub fn classify(first_round: &[u16], offered_reversed: &[u16], second_round: &[u16]) -> SuiteSelection {
    if first_round == second_round {
        SuiteSelection::Server
    } else if second_round == offered_reversed {
        SuiteSelection::Client
    } else {
        SuiteSelection::Complex
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_order() {
        let supp = [0x002F, 0x0035, 0xC013];
        let round1 = [0xC013, 0x0035, 0x002F];
        let offered = reversed_prefix(&supp, round1.len());
        assert_eq!(offered, vec![0xC013, 0x0035, 0x002F]);
        assert_eq!(classify(&round1, &offered, &round1), SuiteSelection::Server);
    }

    #[test]
    fn test_client_order() {
        let supp = [0x002F, 0x0035, 0xC013];
        let round1 = [0x002F, 0x0035, 0xC013];
        let offered = reversed_prefix(&supp, round1.len());
        let round2 = offered.clone();
        assert_eq!(classify(&round1, &offered, &round2), SuiteSelection::Client);
    }

    #[test]
    fn test_complex_order() {
        let supp = [0x002F, 0x0035, 0xC013];
        let round1 = [0x0035, 0x002F, 0xC013];
        let offered = reversed_prefix(&supp, round1.len());
        let round2 = [0x0035, 0xC013, 0x002F];
        assert_eq!(classify(&round1, &offered, &round2), SuiteSelection::Complex);
    }

    #[test]
    fn test_single_suite_counts_as_server() {
        let supp = [0x002F];
        let offered = reversed_prefix(&supp, 1);
        assert_eq!(classify(&supp, &offered, &supp), SuiteSelection::Server);
    }

    #[test]
    fn test_short_first_round() {
        // only two suites could be enumerated in the first round
        assert_eq!(reversed_prefix(&[1, 2, 3], 2), vec![2, 1]);
        assert_eq!(reversed_prefix(&[1, 2, 3], 0), Vec::<u16>::new());
    }
}
