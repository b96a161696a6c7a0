/// Decide and evolve in one step, without persistence.
///
/// Runs `handle` and folds the resulting events back into the aggregate. The
/// infra dispatcher does the same thing around an event store; this helper is
/// what domain tests use to drive an aggregate through a scenario.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: stockroom_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
