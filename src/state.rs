use crate::{
    config::AppConfig,
    db::DbPool,
    services::{
        budget::BudgetReconciler, itinerary::ItineraryTree, trips::TripStore,
        visibility::VisibilityGate,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub store: TripStore,
    pub itinerary: ItineraryTree,
    pub budget: BudgetReconciler,
    pub visibility: VisibilityGate,
}

impl AppState {
    pub fn new(config: &AppConfig, db: DbPool) -> Self {
        let store = TripStore::new(db.clone());
        let itinerary = ItineraryTree::new(db.clone());
        let budget = BudgetReconciler::new(db.clone(), config.cost_precision);
        let visibility = VisibilityGate::new(db, config.share_token_bytes);
        Self {
            store,
            itinerary,
            budget,
            visibility,
        }
    }
}
