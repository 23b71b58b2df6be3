mod tests_augment;
mod tests_compile;
mod tests_features;
mod tests_identity;
mod tests_types;
mod tests_unres;
mod tests_uses;
