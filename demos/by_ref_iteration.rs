//! Demonstration: iterate a `Vec` and a `SlotHashMap` by mutable reference,
//! writing through into the containers' own storage.

use refview::{MapView, SlotHashMap, Viewable};
use std::fmt;

fn scale_list_in_place() {
    let mut values: Vec<i32> = (1..=10).collect();
    let view = values.view();
    let factor = values.len() as i32;

    let mut cur = view.cursor();
    while let Some(value) = cur.next(&mut values) {
        *value *= factor;
    }

    for index in 0..view.len() {
        let value = view.get(&values, index).expect("in range");
        println!("[{}]: {}", index + 1, value);
    }
    println!();
}

struct Person {
    age: u32,
    salary: f64,
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "age: {}, salary: {}", self.age, self.salary)
    }
}

fn print_entries(
    title: &str,
    view: &MapView<String, Person>,
    persons: &mut SlotHashMap<String, Person>,
) {
    println!("{title}");
    let mut cur = view.cursor();
    while let Some(entry) = cur.next(persons) {
        println!("name: {} / {}", entry.key(), entry.value());
    }
}

fn adjust_salaries_in_place() {
    let mut persons: SlotHashMap<String, Person> = [
        ("Denis", 30, 30_000.0),
        ("Cris", 40, 50_000.0),
        ("David", 1, 1_000.0),
    ]
    .into_iter()
    .map(|(name, age, salary)| (name.to_string(), Person { age, salary }))
    .collect();

    let view = persons.view();
    print_entries("initial entries", &view, &mut persons);

    let mut cur = view.cursor();
    while let Some(mut entry) = cur.next(&mut persons) {
        entry.value_mut().salary += 450_000.0;
    }

    *view
        .value_mut(&mut persons, "David")
        .expect("David is present") = Person {
        age: 150,
        salary: 2_147_483_647.0,
    };

    print_entries("\nafter mutation through the view", &view, &mut persons);

    persons.insert("Nubia".to_string(), Person { age: 50, salary: 1_000_000.0 });
    persons.insert("Diana".to_string(), Person { age: 60, salary: 6_000_000.0 });
    persons.insert("Orlando".to_string(), Person { age: 90, salary: 8_000_000.0 });

    print_entries("\nafter external insertions", &view, &mut persons);
}

fn main() {
    scale_list_in_place();
    adjust_salaries_in_place();
}
