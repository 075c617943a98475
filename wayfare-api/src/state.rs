use std::sync::Arc;
use wayfare_catalog::{Attraction, Car, Hotel, Listing, Trip};
use wayfare_core::memory::{
    InMemoryListingRepository, InMemoryOutbox, InMemoryTripRepository, InMemoryUserRepository,
    InMemoryWishlistRepository,
};
use wayfare_core::repository::{
    EventOutbox, ListingRepository, TripRepository, UserRepository, WishlistRepository,
};
use wayfare_core::{ListingManager, TripCoordinator, UserManager, WishlistManager};
use wayfare_store::{
    DbClient, PgEventOutbox, PgListingRepository, PgTripRepository, PgUserRepository,
    PgWishlistRepository, RedisClient,
};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub issuer: Option<String>,
}

#[derive(Clone)]
pub struct RateLimiter {
    pub redis: Arc<RedisClient>,
    pub requests_per_window: i64,
    pub window_seconds: i64,
}

/// Storage handles shared by the managers. Trips are registered twice: once
/// as a plain listing store and once as an aggregate store.
#[derive(Clone)]
pub struct Repositories {
    pub cars: Arc<dyn ListingRepository<Car>>,
    pub hotels: Arc<dyn ListingRepository<Hotel>>,
    pub attractions: Arc<dyn ListingRepository<Attraction>>,
    pub trips: Arc<dyn ListingRepository<Trip>>,
    pub trip_aggregates: Arc<dyn TripRepository>,
    pub wishlist: Arc<dyn WishlistRepository>,
    pub users: Arc<dyn UserRepository>,
    pub outbox: Arc<dyn EventOutbox>,
}

impl Repositories {
    pub fn postgres(db: &DbClient) -> Self {
        let trips = Arc::new(PgTripRepository::new(db.pool.clone()));
        Self {
            cars: Arc::new(PgListingRepository::<Car>::new(db.pool.clone())),
            hotels: Arc::new(PgListingRepository::<Hotel>::new(db.pool.clone())),
            attractions: Arc::new(PgListingRepository::<Attraction>::new(db.pool.clone())),
            trips: trips.clone(),
            trip_aggregates: trips,
            wishlist: Arc::new(PgWishlistRepository::new(db.pool.clone())),
            users: Arc::new(PgUserRepository::new(db.pool.clone())),
            outbox: Arc::new(PgEventOutbox::new(db.pool.clone())),
        }
    }

    pub fn in_memory() -> Self {
        let trips = Arc::new(InMemoryTripRepository::new());
        Self {
            cars: Arc::new(InMemoryListingRepository::<Car>::new()),
            hotels: Arc::new(InMemoryListingRepository::<Hotel>::new()),
            attractions: Arc::new(InMemoryListingRepository::<Attraction>::new()),
            trips: trips.clone(),
            trip_aggregates: trips,
            wishlist: Arc::new(InMemoryWishlistRepository::new()),
            users: Arc::new(InMemoryUserRepository::new()),
            outbox: Arc::new(InMemoryOutbox::new()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub cars: Arc<ListingManager<Car>>,
    pub hotels: Arc<ListingManager<Hotel>>,
    pub attractions: Arc<ListingManager<Attraction>>,
    pub trips: Arc<ListingManager<Trip>>,
    pub trip_coordinator: Arc<TripCoordinator>,
    pub wishlist: Arc<WishlistManager>,
    pub users: Arc<UserManager>,
    pub auth: AuthConfig,
    pub rate_limit: Option<RateLimiter>,
    pub allowed_origins: Vec<String>,
}

impl AppState {
    pub fn new(repos: &Repositories, auth: AuthConfig) -> Self {
        Self {
            cars: listing_manager(repos, repos.cars.clone()),
            hotels: listing_manager(repos, repos.hotels.clone()),
            attractions: listing_manager(repos, repos.attractions.clone()),
            trips: listing_manager(repos, repos.trips.clone()),
            trip_coordinator: Arc::new(TripCoordinator::new(
                repos.trip_aggregates.clone(),
                repos.wishlist.clone(),
                repos.outbox.clone(),
            )),
            wishlist: Arc::new(WishlistManager::new(repos.wishlist.clone())),
            users: Arc::new(UserManager::new(repos.users.clone())),
            auth,
            rate_limit: None,
            allowed_origins: Vec::new(),
        }
    }

    pub fn with_rate_limit(mut self, limiter: RateLimiter) -> Self {
        self.rate_limit = Some(limiter);
        self
    }

    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }
}

fn listing_manager<L: Listing>(
    repos: &Repositories,
    repo: Arc<dyn ListingRepository<L>>,
) -> Arc<ListingManager<L>> {
    Arc::new(ListingManager::new(repo, repos.wishlist.clone(), repos.outbox.clone()))
}

/// Lets the generic listing handlers find the manager for their kind.
pub trait ListingAccess<L: Listing> {
    fn listings(&self) -> &ListingManager<L>;
}

impl ListingAccess<Car> for AppState {
    fn listings(&self) -> &ListingManager<Car> {
        &self.cars
    }
}

impl ListingAccess<Hotel> for AppState {
    fn listings(&self) -> &ListingManager<Hotel> {
        &self.hotels
    }
}

impl ListingAccess<Attraction> for AppState {
    fn listings(&self) -> &ListingManager<Attraction> {
        &self.attractions
    }
}

impl ListingAccess<Trip> for AppState {
    fn listings(&self) -> &ListingManager<Trip> {
        &self.trips
    }
}
