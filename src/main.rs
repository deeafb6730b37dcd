fn main() -> anyhow::Result<()> {
    stress_gauge_lib::run()
}
