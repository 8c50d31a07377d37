use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tourbook_catalog::{
    PartySize, PriceQuote, SeatTally, Tour, TourDate, TourDatePatch, TourDateStatus,
};
use tourbook_core::{
    Booking, CapacityLedger, CatalogRepository, LedgerError, LedgerResult, PaymentStatus,
    ReserveRequest, SeatAvailability,
};
use tourbook_shared::Masked;
use tracing::debug;
use uuid::Uuid;

/// Postgres-backed ledger and catalog.
///
/// Every seat-changing write opens a transaction and takes `FOR UPDATE` on
/// the tour date row first, so writers for one tour date queue behind each
/// other while the aggregate, the check and the insert/update run.
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> LedgerResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(map_db_error)
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct TourRow {
    id: Uuid,
    name: String,
    adult_price: i64,
    child_price: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TourRow> for Tour {
    fn from(row: TourRow) -> Self {
        Tour {
            id: row.id,
            name: row.name,
            adult_price: row.adult_price,
            child_price: row.child_price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TourDateRow {
    id: Uuid,
    tour_id: Uuid,
    starts_at: DateTime<Utc>,
    capacity: i32,
    status: String,
    price_override: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TourDateRow> for TourDate {
    type Error = LedgerError;

    fn try_from(row: TourDateRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<TourDateStatus>()
            .map_err(LedgerError::storage)?;
        Ok(TourDate {
            id: row.id,
            tour_id: row.tour_id,
            starts_at: row.starts_at,
            capacity: row.capacity,
            status,
            price_override: row.price_override,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    tour_date_id: Uuid,
    customer_id: String,
    contact_email: Option<String>,
    adults: i32,
    children: i32,
    payment_status: String,
    total_price: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = LedgerError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let payment_status = row
            .payment_status
            .parse::<PaymentStatus>()
            .map_err(LedgerError::storage)?;
        Ok(Booking {
            id: row.id,
            tour_date_id: row.tour_date_id,
            customer_id: row.customer_id,
            contact_email: row.contact_email.map(Masked),
            adults: row.adults,
            children: row.children,
            payment_status,
            total_price: row.total_price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const TOUR_COLUMNS: &str = "id, name, adult_price, child_price, created_at, updated_at";
const TOUR_DATE_COLUMNS: &str =
    "id, tour_id, starts_at, capacity, status, price_override, created_at, updated_at";
const BOOKING_COLUMNS: &str = "id, tour_date_id, customer_id, contact_email, adults, children, \
     payment_status, total_price, created_at, updated_at";

/// Serialization failures and deadlocks are retryable; everything else is a storage failure.
fn map_db_error(err: sqlx::Error) -> LedgerError {
    if let sqlx::Error::Database(db) = &err {
        if is_retryable_sqlstate(db.code().as_deref()) {
            return LedgerError::ConcurrencyConflict;
        }
    }
    LedgerError::storage(err)
}

fn is_retryable_sqlstate(code: Option<&str>) -> bool {
    matches!(code, Some("40001") | Some("40P01"))
}

async fn lock_tour_date(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> LedgerResult<TourDate> {
    let sql = format!("SELECT {} FROM tour_dates WHERE id = $1 FOR UPDATE", TOUR_DATE_COLUMNS);
    let row = sqlx::query_as::<_, TourDateRow>(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_db_error)?
        .ok_or(LedgerError::TourDateNotFound(id))?;
    row.try_into()
}

async fn fetch_tour(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> LedgerResult<Tour> {
    let sql = format!("SELECT {} FROM tours WHERE id = $1", TOUR_COLUMNS);
    let row = sqlx::query_as::<_, TourRow>(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_db_error)?
        .ok_or(LedgerError::TourNotFound(id))?;
    Ok(row.into())
}

async fn lock_booking(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> LedgerResult<Booking> {
    let sql = format!("SELECT {} FROM bookings WHERE id = $1 FOR UPDATE", BOOKING_COLUMNS);
    let row = sqlx::query_as::<_, BookingRow>(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_db_error)?
        .ok_or(LedgerError::BookingNotFound(id))?;
    row.try_into()
}

/// Seats held on a tour date, leaving out `exclude` when given.
async fn booked_seats(
    tx: &mut Transaction<'_, Postgres>,
    tour_date_id: Uuid,
    exclude: Option<Uuid>,
) -> LedgerResult<i64> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE(SUM(adults + children), 0)::BIGINT
        FROM bookings
        WHERE tour_date_id = $1
          AND payment_status <> 'CANCELLED'
          AND ($2::UUID IS NULL OR id <> $2)
        "#,
    )
    .bind(tour_date_id)
    .bind(exclude)
    .fetch_one(&mut **tx)
    .await
    .map_err(map_db_error)
}

async fn lock_active_date(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> LedgerResult<(Tour, TourDate)> {
    let date = lock_tour_date(tx, id).await?;
    if !date.is_active() {
        return Err(LedgerError::TourDateInactive(id));
    }
    let tour = fetch_tour(tx, date.tour_id).await?;
    Ok((tour, date))
}

#[async_trait]
impl CapacityLedger for PgLedger {
    async fn reserve(&self, request: ReserveRequest) -> LedgerResult<Booking> {
        let mut tx = self.begin().await?;

        let (tour, date) = lock_active_date(&mut tx, request.tour_date_id).await?;
        let booked = booked_seats(&mut tx, date.id, None).await?;
        SeatTally::new(date.capacity, booked).check_fit(request.party.seats())?;
        let quote = PriceQuote::for_party(&tour, &date, request.party)?;

        let booking = Booking::new(
            date.id,
            request.customer_id,
            request.contact_email,
            request.party,
            quote.total,
        );

        sqlx::query(
            r#"
            INSERT INTO bookings (id, tour_date_id, customer_id, contact_email, adults, children, payment_status, total_price, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(booking.id)
        .bind(booking.tour_date_id)
        .bind(&booking.customer_id)
        .bind(booking.contact_email.as_ref().map(|e| e.expose().as_str()))
        .bind(booking.adults)
        .bind(booking.children)
        .bind(booking.payment_status.as_str())
        .bind(booking.total_price)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        debug!(booking_id = %booking.id, booked, capacity = date.capacity, "Reservation committed");

        Ok(booking)
    }

    async fn update_party(&self, booking_id: Uuid, party: PartySize) -> LedgerResult<Booking> {
        let mut tx = self.begin().await?;

        // Tour date lock first, same order as reserve.
        let tour_date_id: Uuid =
            sqlx::query_scalar::<_, Uuid>("SELECT tour_date_id FROM bookings WHERE id = $1")
                .bind(booking_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_db_error)?
                .ok_or(LedgerError::BookingNotFound(booking_id))?;
        let date = lock_tour_date(&mut tx, tour_date_id).await?;

        // Booking state is reported before the date's, as in the in-memory ledger.
        let mut booking = lock_booking(&mut tx, booking_id).await?;
        if !booking.payment_status.is_modifiable() {
            return Err(LedgerError::BookingNotModifiable {
                id: booking_id,
                status: booking.payment_status,
            });
        }
        if !date.is_active() {
            return Err(LedgerError::TourDateInactive(date.id));
        }
        let tour = fetch_tour(&mut tx, date.tour_id).await?;

        let booked = booked_seats(&mut tx, date.id, Some(booking_id)).await?;
        SeatTally::new(date.capacity, booked).check_fit(party.seats())?;
        let quote = PriceQuote::for_party(&tour, &date, party)?;
        booking.resize(party, quote.total);

        sqlx::query(
            "UPDATE bookings SET adults = $1, children = $2, total_price = $3, updated_at = $4 WHERE id = $5",
        )
        .bind(booking.adults)
        .bind(booking.children)
        .bind(booking.total_price)
        .bind(booking.updated_at)
        .bind(booking_id)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(booking)
    }

    async fn set_status(
        &self,
        booking_id: Uuid,
        status: PaymentStatus,
    ) -> LedgerResult<(Booking, PaymentStatus)> {
        let mut tx = self.begin().await?;

        let mut booking = lock_booking(&mut tx, booking_id).await?;
        let previous = booking.transition_to(status)?;

        sqlx::query("UPDATE bookings SET payment_status = $1, updated_at = $2 WHERE id = $3")
            .bind(booking.payment_status.as_str())
            .bind(booking.updated_at)
            .bind(booking_id)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok((booking, previous))
    }

    async fn availability(&self, tour_date_id: Uuid) -> LedgerResult<SeatAvailability> {
        let mut tx = self.begin().await?;

        let capacity = sqlx::query_scalar::<_, i32>("SELECT capacity FROM tour_dates WHERE id = $1")
            .bind(tour_date_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_db_error)?
            .ok_or(LedgerError::TourDateNotFound(tour_date_id))?;
        let booked = booked_seats(&mut tx, tour_date_id, None).await?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(SeatAvailability::from_tally(tour_date_id, SeatTally::new(capacity, booked)))
    }

    async fn get_booking(&self, booking_id: Uuid) -> LedgerResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        sqlx::query_as::<_, BookingRow>(&sql)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .map(Booking::try_from)
            .transpose()
    }

    async fn list_bookings(&self, tour_date_id: Uuid) -> LedgerResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE tour_date_id = $1 ORDER BY created_at",
            BOOKING_COLUMNS
        );
        sqlx::query_as::<_, BookingRow>(&sql)
            .bind(tour_date_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?
            .into_iter()
            .map(Booking::try_from)
            .collect()
    }

    async fn delete_booking(&self, booking_id: Uuid) -> LedgerResult<Booking> {
        let mut tx = self.begin().await?;

        let booking = lock_booking(&mut tx, booking_id).await?;
        if booking.payment_status == PaymentStatus::Paid {
            return Err(LedgerError::PaidBookingDeletion(booking_id));
        }

        sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(booking_id)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(booking)
    }
}

#[async_trait]
impl CatalogRepository for PgLedger {
    async fn create_tour(&self, tour: Tour) -> LedgerResult<Tour> {
        sqlx::query(
            r#"
            INSERT INTO tours (id, name, adult_price, child_price, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(tour.id)
        .bind(&tour.name)
        .bind(tour.adult_price)
        .bind(tour.child_price)
        .bind(tour.created_at)
        .bind(tour.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(tour)
    }

    async fn get_tour(&self, id: Uuid) -> LedgerResult<Option<Tour>> {
        let sql = format!("SELECT {} FROM tours WHERE id = $1", TOUR_COLUMNS);
        let row = sqlx::query_as::<_, TourRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(row.map(Tour::from))
    }

    async fn create_tour_date(&self, date: TourDate) -> LedgerResult<TourDate> {
        let mut tx = self.begin().await?;
        fetch_tour(&mut tx, date.tour_id).await?;

        sqlx::query(
            r#"
            INSERT INTO tour_dates (id, tour_id, starts_at, capacity, status, price_override, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(date.id)
        .bind(date.tour_id)
        .bind(date.starts_at)
        .bind(date.capacity)
        .bind(date.status.as_str())
        .bind(date.price_override)
        .bind(date.created_at)
        .bind(date.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(date)
    }

    async fn get_tour_date(&self, id: Uuid) -> LedgerResult<Option<TourDate>> {
        let sql = format!("SELECT {} FROM tour_dates WHERE id = $1", TOUR_DATE_COLUMNS);
        sqlx::query_as::<_, TourDateRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .map(TourDate::try_from)
            .transpose()
    }

    async fn list_tour_dates(&self, tour_id: Uuid) -> LedgerResult<Vec<TourDate>> {
        let sql = format!(
            "SELECT {} FROM tour_dates WHERE tour_id = $1 ORDER BY starts_at",
            TOUR_DATE_COLUMNS
        );
        sqlx::query_as::<_, TourDateRow>(&sql)
            .bind(tour_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?
            .into_iter()
            .map(TourDate::try_from)
            .collect()
    }

    async fn update_tour_date(&self, id: Uuid, patch: TourDatePatch) -> LedgerResult<TourDate> {
        patch.validate()?;
        let mut tx = self.begin().await?;

        let mut date = lock_tour_date(&mut tx, id).await?;
        if let Some(capacity) = patch.capacity {
            let booked = booked_seats(&mut tx, id, None).await?;
            SeatTally::new(date.capacity, booked).check_capacity_change(capacity)?;
            date.capacity = capacity;
        }
        patch.apply_fields(&mut date);

        sqlx::query(
            "UPDATE tour_dates SET capacity = $1, status = $2, price_override = $3, updated_at = $4 WHERE id = $5",
        )
        .bind(date.capacity)
        .bind(date.status.as_str())
        .bind(date.price_override)
        .bind(date.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(date)
    }
}
