/// Invitation codes
///
/// A code is handed to a person whose record was created by someone else. It
/// is exactly [`INVITATION_CODE_LENGTH`] characters from `A-Z0-9` and is
/// unique among stored codes when generated. Claiming it clears it.

use rand::Rng;
use sqlx::PgConnection;
use tracing::{debug, warn};

use crate::error::{MartialBaseError, MartialBaseResult};
use crate::models::user::MartialBaseUser;

pub const INVITATION_CODE_LENGTH: usize = 7;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Collisions are vanishingly rare with 36^7 codes; this only bounds the loop
const MAX_ATTEMPTS: usize = 32;

/// Random candidate code, not checked against storage
pub fn random_invitation_code() -> String {
    let mut rng = rand::thread_rng();

    (0..INVITATION_CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Checks the shape of a code (length and alphabet)
pub fn is_valid_invitation_code(code: &str) -> bool {
    code.len() == INVITATION_CODE_LENGTH
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// Generates a code that no stored user currently holds
///
/// # Errors
///
/// `Validation` if no free code was found within the attempt limit, or a
/// database error from the uniqueness lookup.
pub async fn generate_invitation_code(conn: &mut PgConnection) -> MartialBaseResult<String> {
    for attempt in 1..=MAX_ATTEMPTS {
        let candidate = random_invitation_code();

        if !MartialBaseUser::invitation_code_exists(&mut *conn, &candidate).await? {
            debug!(attempt, "Generated invitation code");
            return Ok(candidate);
        }

        warn!(attempt, "Invitation code collision, retrying");
    }

    Err(MartialBaseError::Validation(
        "Could not generate a unique invitation code".to_string(),
    ))
}
