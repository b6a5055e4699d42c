use super::grid::Point;
use super::state::World;
use rand::Rng;

/// Uniform samples drawn before giving up on a perfectly safe cell.
pub const SPAWN_ATTEMPTS: usize = 64;

/// Per-missing-food sampling budget for replenishment.
pub const FOOD_ATTEMPTS_PER_ITEM: usize = 16;

fn random_cell(world: &World, rng: &mut impl Rng) -> Point {
    let bounds = world.bounds();
    Point::new(rng.gen_range(0..bounds.width), rng.gen_range(0..bounds.height))
}

fn occupied_neighbors(world: &World, center: Point, radius: i32) -> usize {
    let mut count = 0;
    for dx in -radius..=radius {
        for dy in -radius..=radius {
            let cell = Point::new(center.x + dx, center.y + dy);
            if world.is_cell_occupied(cell) {
                count += 1;
            }
        }
    }
    count
}

/// Pick a spawn cell whose neighborhood of `radius` holds no living snake
/// body. Sampling is bounded; when the grid is too crowded the least
/// crowded sampled cell is returned instead.
pub fn safe_spawn_position(world: &World, radius: i32, rng: &mut impl Rng) -> Point {
    let mut best = random_cell(world, rng);
    let mut best_neighbors = occupied_neighbors(world, best, radius);
    if best_neighbors == 0 {
        return best;
    }
    for _ in 1..SPAWN_ATTEMPTS {
        let candidate = random_cell(world, rng);
        let neighbors = occupied_neighbors(world, candidate, radius);
        if neighbors == 0 {
            return candidate;
        }
        if neighbors < best_neighbors {
            best = candidate;
            best_neighbors = neighbors;
        }
    }
    best
}

/// Refill food up to `target` by rejection sampling over empty cells. The
/// attempt budget keeps a near-full grid from spinning; coming up short is
/// not an error.
pub fn replenish_foods(world: &mut World, target: usize, rng: &mut impl Rng) {
    let missing = target.saturating_sub(world.food_count());
    if missing == 0 {
        return;
    }
    let mut budget = missing * FOOD_ATTEMPTS_PER_ITEM;
    while world.food_count() < target && budget > 0 {
        budget -= 1;
        let cell = random_cell(world, rng);
        if world.is_cell_occupied(cell) || world.has_food(cell) {
            continue;
        }
        world.add_food(cell);
    }
    if world.food_count() < target {
        tracing::debug!(
            current = world.food_count(),
            target,
            "food replenishment stopped short of target"
        );
    }
}
