pub mod budget;
pub mod itinerary;
pub mod ordering;
pub mod trips;
pub mod visibility;
