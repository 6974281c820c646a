pub fn main() -> anyhow::Result<()> {
    crate::shell::start()
}
