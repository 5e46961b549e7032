use crate::models::Event;

/// Drops every unbooked event that overlaps a booked one. Bookings always
/// stay, whatever their category. Survivors keep their order.
pub fn resolve_conflicts(events: Vec<Event>) -> Vec<Event> {
    let booked: Vec<Event> = events.iter().filter(|e| e.booked()).cloned().collect();
    if booked.is_empty() {
        return events;
    }
    events
        .into_iter()
        .filter(|event| event.booked() || !booked.iter().any(|b| event.intersects(b)))
        .collect()
}
