use crate::domain::models::OperationType;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Length of the instruction-discriminator prefix used by the lending
/// program (anchor convention).
pub const DISCRIMINATOR_LEN: usize = 8;

// Discriminators as deployed, taken from the program IDL. The deployed
// program reuses the init_user bytes for init_user_token_state.
const DEPOSIT: [u8; 8] = [242, 35, 198, 137, 82, 225, 242, 182];
const WITHDRAW: [u8; 8] = [183, 18, 70, 156, 148, 109, 161, 34];
const BORROW: [u8; 8] = [47, 86, 47, 204, 142, 160, 81, 28];
const REPAY: [u8; 8] = [234, 103, 67, 82, 208, 234, 219, 166];
const INIT_ACCOUNT: [u8; 8] = [93, 39, 255, 186, 239, 199, 197, 123];
const INIT_ACCOUNT_STATE: [u8; 8] = [93, 39, 255, 186, 239, 199, 197, 123];

static DISCRIMINATORS: LazyLock<HashMap<[u8; DISCRIMINATOR_LEN], OperationType>> =
    LazyLock::new(|| {
        let table = [
            (DEPOSIT, OperationType::Deposit),
            (WITHDRAW, OperationType::Withdraw),
            (BORROW, OperationType::Borrow),
            (REPAY, OperationType::Repay),
            (INIT_ACCOUNT, OperationType::InitAccount),
            (INIT_ACCOUNT_STATE, OperationType::InitAccountState),
        ];
        let mut map = HashMap::with_capacity(table.len());
        for (bytes, operation) in table {
            // Earlier entries win when discriminators collide, matching the
            // scan order of the deployed client.
            map.entry(bytes).or_insert(operation);
        }
        map
    });

/// Maps an instruction payload to its operation. Pure function of the
/// leading eight bytes: same bytes in, same operation out, always. Payloads
/// shorter than the discriminator fall back to `Unknown`.
pub fn classify(data: &[u8]) -> OperationType {
    if data.len() < DISCRIMINATOR_LEN {
        return OperationType::Unknown;
    }
    let mut discriminator = [0u8; DISCRIMINATOR_LEN];
    discriminator.copy_from_slice(&data[..DISCRIMINATOR_LEN]);
    DISCRIMINATORS
        .get(&discriminator)
        .copied()
        .unwrap_or(OperationType::Unknown)
}
