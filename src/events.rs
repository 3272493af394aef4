use crate::error::RpcError;
use alloy::primitives::B256;
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;

sol! {
    event Transfer(address indexed from, address indexed to, uint256 value);
}

/// `keccak256("Transfer(address,address,uint256)")`, topic[0] of every
/// ERC-20 transfer log.
pub fn transfer_topic() -> B256 {
    Transfer::SIGNATURE_HASH
}

pub fn decode_transfer(log: &Log) -> Result<Transfer, RpcError> {
    let log_data = log.data();
    Transfer::decode_raw_log(log.topics(), &log_data.data)
        .map_err(|e| RpcError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, LogData, U256};
    use std::str::FromStr;

    fn transfer_log(from: Address, to: Address, value: U256) -> Log {
        let topics = vec![
            Transfer::SIGNATURE_HASH,
            B256::left_padding_from(from.as_slice()),
            B256::left_padding_from(to.as_slice()),
        ];
        let data = value.to_be_bytes::<32>().to_vec();
        Log {
            inner: alloy::primitives::Log {
                address: Address::ZERO,
                data: LogData::new_unchecked(topics, data.into()),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_transfer_topic_constant() {
        assert_eq!(
            transfer_topic().to_string(),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn test_decode_transfer_roundtrip() {
        let from = Address::from_str("0x1111111111111111111111111111111111111111").unwrap();
        let to = Address::from_str("0x2222222222222222222222222222222222222222").unwrap();
        let value = U256::from(5_000_000u64);

        let event = decode_transfer(&transfer_log(from, to, value)).unwrap();
        assert_eq!(event.from, from);
        assert_eq!(event.to, to);
        assert_eq!(event.value, value);
    }

    #[test]
    fn test_decode_rejects_malformed_topics() {
        let log = Log {
            inner: alloy::primitives::Log {
                address: Address::ZERO,
                data: LogData::new_unchecked(vec![Transfer::SIGNATURE_HASH], vec![].into()),
            },
            ..Default::default()
        };
        assert!(decode_transfer(&log).is_err());
    }
}
