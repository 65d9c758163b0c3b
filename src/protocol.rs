// src/protocol.rs
//! 行协议的词法与文案：
//! - 按空白切分一行命令，关键字大小写不敏感（参数保持原样）
//! - 各命令的 usage 文案与错误回复格式
//! - 回复与推送共用的 `<key> <value>\n` 行格式

/// SET 命令用法
pub const SET_USAGE: &str = "SET <key> <value> [ttl-seconds]";
/// GET 命令用法
pub const GET_USAGE: &str = "GET <key>";
/// DEL 命令用法
pub const DEL_USAGE: &str = "DEL <key>";
/// TTL 命令用法
pub const TTL_USAGE: &str = "TTL <key>";
/// SUBSCRIBE 命令用法
pub const SUBSCRIBE_USAGE: &str = "SUBSCRIBE <key>";
/// UNSUBSCRIBE 命令用法
pub const UNSUBSCRIBE_USAGE: &str = "UNSUBSCRIBE <key>";
/// INFO 命令用法
pub const INFO_USAGE: &str = "INFO [section]";

/// 把一行输入切成词元，空行返回空 Vec
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(|s| s.to_string()).collect()
}

/// 参数个数错误的统一回复
pub fn wrong_args(cmd: &str, usage: &str) -> String {
    format!("ERR wrong number of arguments for '{}' (usage: {})", cmd, usage)
}

/// 回复与推送共用的行格式，key 不存在时 value 为空串
pub fn kv_line(key: &str, value: &str) -> String {
    format!("{} {}\n", key, value)
}
