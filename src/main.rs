fn main() -> anyhow::Result<()> {
    med_tracker_lib::run()
}
