/*! Integration tests for folio.
 *
 * This test suite is organized as a single integration test binary. The
 * module structure mirrors the main library structure:
 * - binder: subscribing, transform acceptance, fan-out, kicks, flushing,
 *   idle and failure shutdown
 * - curator: access control, binder lifecycle, admin fan-out, close
 * - stories: table-driven end-to-end edit histories replayed through a
 *   live binder with a fleet of listening subscribers
 */

mod curator;
mod helpers;
mod stories;
