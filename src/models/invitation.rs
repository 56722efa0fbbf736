use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};

pub const CODE_LENGTH: usize = 17;
const RANDOM_PART_LENGTH: usize = 12;
const TIMESTAMP_PART_LENGTH: usize = 5;
const TIMESTAMP_MODULUS: i64 = 100_000;

/// Upper bound on collision retries before code generation gives up.
pub const MAX_CODE_ATTEMPTS: usize = 10;

pub const INVITATIONS_PER_PAGE: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invitation {
    pub id: i64,
    pub created_by: i64,
    pub code: String,
    pub role_slug: String,
    pub redirect_url: Option<String>,
    pub is_used: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invitation {
    /// An invitation can be redeemed while it is unused and not past its expiry.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        if self.is_used {
            return false;
        }

        match self.expires_at {
            Some(expires_at) if expires_at < now => false,
            _ => true,
        }
    }

    pub fn invite_url(&self, app_url: &str) -> String {
        build_invite_url(app_url, self.redirect_url.as_deref(), &self.code)
    }
}

pub fn build_invite_url(app_url: &str, redirect_url: Option<&str>, code: &str) -> String {
    let code = urlencoding::encode(code);
    match redirect_url {
        Some(redirect_url) if !redirect_url.is_empty() => format!("{}?code={}", redirect_url, code),
        _ => format!("{}/register?code={}", app_url.trim_end_matches('/'), code),
    }
}

#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub created_by: i64,
    pub code: String,
    pub role_slug: String,
    pub redirect_url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Creator {
    pub id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationWithCreator {
    #[serde(flatten)]
    pub invitation: Invitation,
    pub creator: Option<Creator>,
}

#[derive(Debug, FromRow)]
pub struct InvitationListRow {
    #[sqlx(flatten)]
    pub invitation: Invitation,
    pub creator_name: Option<String>,
    pub creator_email: Option<String>,
}

impl From<InvitationListRow> for InvitationWithCreator {
    fn from(row: InvitationListRow) -> Self {
        let creator = match (row.creator_name, row.creator_email) {
            (Some(name), Some(email)) => Some(Creator {
                id: row.invitation.created_by,
                name,
                email,
            }),
            _ => None,
        };

        Self {
            invitation: row.invitation,
            creator,
        }
    }
}

/// One page of results, shaped the way the invitation table consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub current_page: i64,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, current_page: i64, per_page: i64, total: i64) -> Self {
        let last_page = if total == 0 { 1 } else { (total + per_page - 1) / per_page };
        Self {
            data,
            current_page,
            per_page,
            total,
            last_page,
        }
    }
}

/// Twelve random uppercase alphanumerics.
pub fn random_code_part<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..RANDOM_PART_LENGTH)
        .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_uppercase())
        .collect()
}

/// `unix_secs % 100000` in uppercase base 36, zero padded to five characters.
pub fn timestamp_code_part(unix_secs: i64) -> String {
    let mut value = unix_secs.rem_euclid(TIMESTAMP_MODULUS) as u32;
    let mut digits = Vec::with_capacity(TIMESTAMP_PART_LENGTH);
    loop {
        let digit = std::char::from_digit(value % 36, 36).unwrap_or('0');
        digits.push(digit.to_ascii_uppercase());
        value /= 36;
        if value == 0 {
            break;
        }
    }
    let encoded: String = digits.iter().rev().collect();
    format!("{:0>width$}", encoded, width = TIMESTAMP_PART_LENGTH)
}

pub fn generate_code_candidate(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let mut code = random_code_part(&mut rng);
    code.push_str(&timestamp_code_part(now.timestamp()));
    code
}
