use bcrypt::{DEFAULT_COST, hash, verify};
use rand::Rng;

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), DEFAULT_COST)
}

// bcrypt 哈希优先，遗留的明文行退化为直接比较
pub fn verify_password(password: &str, stored: &str) -> bool {
    if stored.starts_with("$2") {
        verify(password.as_bytes(), stored).unwrap_or(false)
    } else {
        stored == password
    }
}

pub fn generate_otp_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}

// 从邮箱 local part 推导用户ID，如 alice@example.com -> user_alice
pub fn uid_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    format!("user_{}", local)
}

/// 从奖励文案解析前导整数，"500 XP" -> 500，无前导数字则为 0。
pub fn parse_reward_points(reward: &str) -> i64 {
    reward
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

pub fn maps_link(latitude: f64, longitude: f64) -> String {
    format!("https://maps.google.com/?q={},{}", latitude, longitude)
}
