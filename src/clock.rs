pub fn now_sec() -> i64 {
    jiff::Timestamp::now().as_second()
}
