fn main() -> Result<(), anyhow::Error> {
    xtaskops::tasks::main()
}
